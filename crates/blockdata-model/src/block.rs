//! Block tree nodes
//!
//! [`BlockNode`] is what a block parser produces; [`EnrichedBlock`] is what
//! the pipeline emits after attribute resolution and rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute map keyed by attribute name
pub type Attributes = Map<String, Value>;

/// One node of a parsed block tree
///
/// A node without a name is freeform content between blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNode {
    /// Block name such as `core/paragraph`
    #[serde(rename = "blockName", alias = "name", default)]
    pub name: Option<String>,
    /// Attributes literally present in the block annotation
    #[serde(default, deserialize_with = "attrs_or_empty")]
    pub attrs: Attributes,
    /// Markup between the opening and closing annotation, children excluded
    #[serde(rename = "innerHTML", default)]
    pub inner_html: String,
    /// Nested blocks in source order
    #[serde(default)]
    pub inner_blocks: Vec<BlockNode>,
}

impl BlockNode {
    /// Create a named block with markup and no attributes
    #[must_use]
    pub fn new(name: impl Into<String>, inner_html: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            inner_html: inner_html.into(),
            ..Self::default()
        }
    }

    /// Create a freeform (nameless) node
    #[must_use]
    pub fn freeform(inner_html: impl Into<String>) -> Self {
        Self {
            inner_html: inner_html.into(),
            ..Self::default()
        }
    }

    /// Set one raw attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Append a child block
    #[must_use]
    pub fn with_child(mut self, child: BlockNode) -> Self {
        self.inner_blocks.push(child);
        self
    }

    /// Block name, treating the empty string as absent
    #[inline]
    #[must_use]
    pub fn block_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Whether this node is a real block rather than freeform content
    #[inline]
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.block_name().is_some()
    }
}

/// A block after attribute resolution and rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedBlock {
    /// Block name
    #[serde(rename = "blockName")]
    pub name: String,
    /// Raw attributes merged with resolved ones
    pub attrs: Attributes,
    /// Markup between the annotations, children excluded
    #[serde(rename = "innerHTML")]
    pub inner_html: String,
    /// Enriched children; freeform children are left out
    pub inner_blocks: Vec<EnrichedBlock>,
    /// Rendered and shortcode-expanded HTML
    pub rendered: String,
}

impl EnrichedBlock {
    /// Depth-first iterator over this block and all of its descendants
    pub fn walk(&self) -> impl Iterator<Item = &EnrichedBlock> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.inner_blocks.iter().rev());
            Some(next)
        })
    }
}

fn attrs_or_empty<'de, D>(deserializer: D) -> Result<Attributes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Parsers emit `[]` or `null` for blocks without attributes
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Attributes::new(),
    })
}
