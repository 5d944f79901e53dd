//! Comment-delimited block parser for tests
//!
//! Understands `<!-- block:NAME {json} -->`, `<!-- /block -->` (optionally
//! `<!-- /block:NAME -->`) and the self-closing `<!-- block:NAME {json} /-->`. Text outside any block becomes
//! freeform nodes.

use blockdata_core::{BlockParser, ExtractError, ExtractResult};
use blockdata_model::{Attributes, BlockNode};
use regex::Regex;

const DELIMITER: &str = r"(?s)<!--\s+(?P<closer>/)?block(?::(?P<name>[a-z][a-z0-9_-]*(?:/[a-z][a-z0-9_-]*)?))?\s+(?:(?P<attrs>\{.*?\})\s+)?(?P<void>/)?-->";

/// Stack-based parser over block comment delimiters
#[derive(Debug, Clone)]
pub struct CommentBlockParser {
    delimiter: Regex,
}

impl Default for CommentBlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentBlockParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            delimiter: Regex::new(DELIMITER).expect("delimiter pattern is valid"),
        }
    }

    fn attach(node: BlockNode, stack: &mut [BlockNode], roots: &mut Vec<BlockNode>) {
        match stack.last_mut() {
            Some(parent) => parent.inner_blocks.push(node),
            None => roots.push(node),
        }
    }

    fn text(text: &str, stack: &mut [BlockNode], roots: &mut Vec<BlockNode>) {
        if text.is_empty() {
            return;
        }
        match stack.last_mut() {
            Some(parent) => parent.inner_html.push_str(text),
            None => roots.push(BlockNode::freeform(text)),
        }
    }
}

impl BlockParser for CommentBlockParser {
    fn parse(&self, content: &str) -> ExtractResult<Vec<BlockNode>> {
        let mut roots = Vec::new();
        let mut stack: Vec<BlockNode> = Vec::new();
        let mut cursor = 0;

        for caps in self.delimiter.captures_iter(content) {
            let whole = caps.get(0).map_or(cursor..cursor, |m| m.range());
            Self::text(&content[cursor..whole.start], &mut stack, &mut roots);
            cursor = whole.end;

            let named = caps.name("name").map(|m| m.as_str());

            if caps.name("closer").is_some() {
                let name = named.unwrap_or_default();
                let open = stack
                    .pop()
                    .ok_or_else(|| ExtractError::Parse(format!("unexpected closer '{name}'")))?;
                if named.is_some_and(|name| open.name.as_deref() != Some(name)) {
                    return Err(ExtractError::Parse(format!(
                        "closer '{name}' does not match open block '{}'",
                        open.name.unwrap_or_default()
                    )));
                }
                Self::attach(open, &mut stack, &mut roots);
                continue;
            }

            let name =
                named.ok_or_else(|| ExtractError::Parse("block opener without a name".into()))?;
            let attrs: Attributes = match caps.name("attrs") {
                Some(json) => serde_json::from_str(json.as_str())
                    .map_err(|err| ExtractError::Parse(format!("attributes of '{name}': {err}")))?,
                None => Attributes::new(),
            };
            let node = BlockNode {
                name: Some(name.to_string()),
                attrs,
                ..BlockNode::default()
            };

            if caps.name("void").is_some() {
                Self::attach(node, &mut stack, &mut roots);
            } else {
                stack.push(node);
            }
        }

        Self::text(&content[cursor..], &mut stack, &mut roots);

        if let Some(open) = stack.last() {
            return Err(ExtractError::Parse(format!(
                "block '{}' is never closed",
                open.name.as_deref().unwrap_or_default()
            )));
        }
        Ok(roots)
    }
}
