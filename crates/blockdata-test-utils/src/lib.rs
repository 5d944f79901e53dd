//! Testing utilities for blockdata workspace
//!
//! Shared fakes, fixtures and builders for pipeline tests.

#![allow(missing_docs)]

mod dom;
mod parser;

pub use dom::{FragmentDom, FragmentNodes};
pub use parser::CommentBlockParser;

use blockdata_core::{
    BlockParser, BlockPipeline, BlockPipelineBuilder, BlockRenderer, ExtractError, ExtractResult,
    InMemoryBlockTypeRegistry, ShortcodeExpander,
};
use blockdata_model::{AttributeSchema, AttributeSource, BlockNode, BlockType, SchemaSet};
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Parser returning a fixed tree regardless of content
#[derive(Debug, Clone, Default)]
pub struct TreeParser(pub Vec<BlockNode>);

impl BlockParser for TreeParser {
    fn parse(&self, _content: &str) -> ExtractResult<Vec<BlockNode>> {
        Ok(self.0.clone())
    }
}

/// Wraps a parser and counts how often it runs
#[derive(Debug, Default)]
pub struct CountingParser<P> {
    inner: P,
    calls: AtomicUsize,
}

impl<P: BlockParser> CountingParser<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<P: BlockParser> BlockParser for CountingParser<P> {
    fn parse(&self, content: &str) -> ExtractResult<Vec<BlockNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(content)
    }
}

/// Parser that always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingParser;

impl BlockParser for FailingParser {
    fn parse(&self, _content: &str) -> ExtractResult<Vec<BlockNode>> {
        Err(ExtractError::Parse("unterminated block".into()))
    }
}

/// Renders a block as its trimmed inner markup
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoRenderer;

impl BlockRenderer for EchoRenderer {
    fn render(&self, block: &BlockNode) -> ExtractResult<String> {
        Ok(block.inner_html.trim().to_string())
    }
}

/// Renderer failing for one block name
#[derive(Debug, Clone)]
pub struct FailingRenderer(pub &'static str);

impl BlockRenderer for FailingRenderer {
    fn render(&self, block: &BlockNode) -> ExtractResult<String> {
        match block.block_name() {
            Some(name) if name == self.0 => Err(ExtractError::render(name, "template missing")),
            _ => EchoRenderer.render(block),
        }
    }
}

/// Expands `[name]` shortcodes to `<span class="sc-name"></span>`
#[derive(Debug, Clone)]
pub struct BracketShortcodes {
    pattern: Regex,
}

impl BracketShortcodes {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\[([a-z][a-z0-9_-]*)\]").expect("shortcode pattern is valid"),
        }
    }
}

impl Default for BracketShortcodes {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortcodeExpander for BracketShortcodes {
    fn expand(&self, html: &str) -> ExtractResult<String> {
        Ok(self
            .pattern
            .replace_all(html, "<span class=\"sc-$1\"></span>")
            .into_owned())
    }
}

/// `core/paragraph`: `content` is the inner HTML of `<p>`
pub fn paragraph_type() -> BlockType {
    BlockType::default().with_attribute(
        "content",
        AttributeSchema::new(AttributeSource::Html {
            selector: Some("p".into()),
        })
        .with_type("string"),
    )
}

/// `core/image`: source, alt text and caption, anchor supported
pub fn image_type() -> BlockType {
    BlockType::default()
        .with_attribute(
            "url",
            AttributeSchema::new(AttributeSource::Attribute {
                selector: Some("img".into()),
                attribute: "src".into(),
            })
            .with_type("string"),
        )
        .with_attribute(
            "alt",
            AttributeSchema::new(AttributeSource::Attribute {
                selector: Some("img".into()),
                attribute: "alt".into(),
            })
            .with_type("string")
            .with_default(""),
        )
        .with_attribute(
            "caption",
            AttributeSchema::new(AttributeSource::Html {
                selector: Some("figcaption".into()),
            })
            .with_type("string"),
        )
        .with_anchor_support(true)
}

/// `core/gallery`: `images` is one `{url, alt}` entry per `<img>`
pub fn gallery_type() -> BlockType {
    let mut query = SchemaSet::new();
    query.insert(
        "url".into(),
        AttributeSchema::new(AttributeSource::Attribute {
            selector: None,
            attribute: "src".into(),
        }),
    );
    query.insert(
        "alt".into(),
        AttributeSchema::new(AttributeSource::Attribute {
            selector: None,
            attribute: "alt".into(),
        }),
    );
    BlockType::default().with_attribute(
        "images",
        AttributeSchema::new(AttributeSource::Query {
            selector: Some("img".into()),
            query,
        })
        .with_type("array")
        .with_default(serde_json::json!([])),
    )
}

/// `core/post-subtitle`: `subtitle` comes from entity metadata
pub fn subtitle_type() -> BlockType {
    BlockType::default().with_attribute(
        "subtitle",
        AttributeSchema::new(AttributeSource::Meta {
            key: "subtitle".into(),
        })
        .with_type("string")
        .with_default("untitled"),
    )
}

/// Registry with the fixture block types; `core/group` has no attributes
pub fn registry() -> InMemoryBlockTypeRegistry {
    let mut registry = InMemoryBlockTypeRegistry::new();
    registry
        .register("core/paragraph", paragraph_type())
        .register("core/image", image_type())
        .register("core/gallery", gallery_type())
        .register("core/post-subtitle", subtitle_type())
        .register("core/group", BlockType::default());
    registry
}

/// Builder with the fixture registry, echo renderer and fragment DOM
pub fn pipeline_builder(parser: Arc<dyn BlockParser>) -> BlockPipelineBuilder {
    BlockPipeline::builder()
        .parser(parser)
        .registry(Arc::new(registry()))
        .renderer(Arc::new(EchoRenderer))
        .dom(Arc::new(FragmentDom))
}

/// Pipeline over [`CommentBlockParser`] with defaults everywhere else
pub fn pipeline() -> BlockPipeline {
    pipeline_builder(Arc::new(CommentBlockParser::new()))
        .build()
        .expect("fixture pipeline has every required collaborator")
}

/// Wrap markup in a block annotation
pub fn block(name: &str, attrs: &serde_json::Value, inner: &str) -> String {
    if attrs.as_object().is_some_and(serde_json::Map::is_empty) || attrs.is_null() {
        format!("<!-- block:{name} -->{inner}<!-- /block -->")
    } else {
        format!("<!-- block:{name} {attrs} -->{inner}<!-- /block -->")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counting_parser_counts() {
        let parser = CountingParser::new(TreeParser(vec![BlockNode::new("core/group", "")]));
        parser.parse("a").unwrap();
        parser.parse("b").unwrap();
        assert_eq!(parser.calls(), 2);
    }

    #[test]
    fn shortcodes_expand_brackets() {
        let out = BracketShortcodes::new().expand("<p>[gallery] [x y]</p>").unwrap();
        assert_eq!(out, "<p><span class=\"sc-gallery\"></span> [x y]</p>");
    }

    #[test]
    fn block_helper_formats_annotations() {
        assert_eq!(
            block("core/paragraph", &json!({}), "<p>x</p>"),
            "<!-- block:core/paragraph --><p>x</p><!-- /block -->"
        );
        assert_eq!(
            block("core/paragraph", &json!({ "content": "x" }), ""),
            "<!-- block:core/paragraph {\"content\":\"x\"} --><!-- /block -->"
        );
    }

    #[test]
    fn fixture_registry_is_complete() {
        let registry = registry();
        for name in ["core/paragraph", "core/image", "core/gallery", "core/post-subtitle", "core/group"] {
            assert!(registry.contains(name), "{name} missing");
        }
    }
}
