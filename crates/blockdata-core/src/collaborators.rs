//! Interfaces of the external collaborators the pipeline drives
//!
//! The pipeline never parses block grammar, renders blocks or walks HTML
//! itself. Each of those concerns sits behind one of the traits below and
//! is handed to [`BlockPipeline::builder`](crate::BlockPipeline::builder).

use crate::cache::CacheScope;
use crate::error::ExtractResult;
use crate::EntityId;
use blockdata_model::{AttributeSchema, BlockNode, BlockType};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Every metadata value of one entity, keyed by metadata key
///
/// Keys can hold several values; single-value reads see the first one.
pub type EntityMetadata = BTreeMap<String, Vec<Value>>;

/// Splits raw content into a block tree
pub trait BlockParser: Send + Sync {
    /// Parse content into top-level nodes, freeform runs included
    fn parse(&self, content: &str) -> ExtractResult<Vec<BlockNode>>;
}

/// Supplies attribute schemas and capabilities per block name
pub trait BlockTypeRegistry: Send + Sync {
    /// Look up a block type; `None` when the name is not registered
    fn lookup(&self, name: &str) -> Option<BlockType>;
}

/// Turns a block node into its final HTML
pub trait BlockRenderer: Send + Sync {
    /// Render one block (attributes already resolved)
    fn render(&self, block: &BlockNode) -> ExtractResult<String>;
}

/// Post-processes rendered HTML
pub trait ShortcodeExpander: Send + Sync {
    /// Expand shortcodes in rendered markup
    fn expand(&self, html: &str) -> ExtractResult<String>;
}

/// Result of one DOM query
///
/// Scalar accessors read the first matched node, like jQuery-style APIs.
pub trait NodeSet {
    /// Number of matched nodes
    fn len(&self) -> usize;

    /// Whether nothing matched
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Named attribute of the first node, `None` when absent
    fn attr(&self, name: &str) -> Option<String>;

    /// Inner HTML of the first node
    fn html(&self) -> String;

    /// Text content of the first node
    fn text(&self) -> String;

    /// Outer markup of every matched node, in document order
    fn outer_html_each(&self) -> Vec<String>;
}

/// Selector-based DOM engine
pub trait DomQuery: Send + Sync {
    /// Parse `html` and select nodes
    ///
    /// With `selector = None` the top-level nodes of the fragment are
    /// returned.
    fn query(&self, html: &str, selector: Option<&str>) -> ExtractResult<Box<dyn NodeSet>>;
}

/// Per-entity metadata
pub trait MetadataStore: Send + Sync {
    /// Single value for `key`; `None` when the key is absent
    fn get(&self, entity_id: EntityId, key: &str) -> ExtractResult<Option<Value>>;

    /// Full metadata set, used for fingerprinting
    fn get_all(&self, entity_id: EntityId) -> ExtractResult<EntityMetadata>;
}

/// Shared key-value cache
pub trait CacheStore: Send + Sync {
    /// Fetch a stored payload
    fn get(&self, scope: CacheScope, key: &str) -> ExtractResult<Option<Value>>;

    /// Store a payload; `ttl = None` never expires
    fn set(&self, scope: CacheScope, key: &str, value: Value, ttl: Option<Duration>)
        -> ExtractResult<()>;

    /// Remove a payload, reporting whether one was present
    fn delete(&self, scope: CacheScope, key: &str) -> ExtractResult<bool>;
}

/// JSON-schema style value checking
pub trait SchemaValidator: Send + Sync {
    /// Whether `value` conforms to the attribute's schema
    fn validate(&self, value: &Value, schema: &AttributeSchema) -> bool;

    /// Coerce `value` into the attribute's schema
    fn sanitize(&self, value: Value, schema: &AttributeSchema) -> ExtractResult<Value>;
}

/// Shortcode expander that leaves markup untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShortcodes;

impl ShortcodeExpander for NoShortcodes {
    fn expand(&self, html: &str) -> ExtractResult<String> {
        Ok(html.to_string())
    }
}
