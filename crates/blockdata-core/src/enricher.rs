//! Block enrichment
//!
//! Turns one parsed [`BlockNode`] into an [`EnrichedBlock`]: fills in the
//! attributes its block type declares but the annotation omits, renders it,
//! and recurses into its children. Freeform nodes are omitted at every
//! depth, so children are compacted rather than padded with placeholders.

use crate::collaborators::{BlockRenderer, BlockTypeRegistry, ShortcodeExpander};
use crate::error::ExtractResult;
use crate::resolver::AttributeResolver;
use crate::EntityId;
use blockdata_model::{AttributeSchema, BlockNode, BlockType, EnrichedBlock, SchemaSet};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Name of the attribute synthesized for blocks supporting anchors
pub const ANCHOR_ATTRIBUTE: &str = "anchor";

/// Enriches block nodes recursively
#[derive(Clone)]
pub struct BlockEnricher {
    registry: Arc<dyn BlockTypeRegistry>,
    renderer: Arc<dyn BlockRenderer>,
    shortcodes: Arc<dyn ShortcodeExpander>,
    resolver: AttributeResolver,
}

impl BlockEnricher {
    /// Create enricher over the given collaborators
    #[must_use]
    pub fn new(
        registry: Arc<dyn BlockTypeRegistry>,
        renderer: Arc<dyn BlockRenderer>,
        shortcodes: Arc<dyn ShortcodeExpander>,
        resolver: AttributeResolver,
    ) -> Self {
        Self {
            registry,
            renderer,
            shortcodes,
            resolver,
        }
    }

    /// Get the attribute resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    /// Enrich one node and its descendants
    ///
    /// Returns `None` for freeform (nameless) nodes.
    ///
    /// # Errors
    /// Propagates resolver, renderer and shortcode failures
    pub fn enrich(
        &self,
        node: &BlockNode,
        entity_id: EntityId,
    ) -> ExtractResult<Option<EnrichedBlock>> {
        let Some(name) = node.block_name() else {
            return Ok(None);
        };

        let mut block = node.clone();
        match self.registry.lookup(name) {
            Some(block_type) => {
                for (key, schema) in schema_set(&block_type).iter() {
                    if block.attrs.contains_key(key) {
                        continue;
                    }
                    let value = self.resolver.resolve(schema, &node.inner_html, entity_id)?;
                    block.attrs.insert(key.clone(), value);
                }
            }
            None => debug!(block = name, "block type not registered, keeping raw attributes"),
        }

        let rendered = self.renderer.render(&block)?;
        let rendered = self.shortcodes.expand(&rendered)?;

        let mut inner_blocks = Vec::with_capacity(node.inner_blocks.len());
        for child in &node.inner_blocks {
            if let Some(enriched) = self.enrich(child, entity_id)? {
                inner_blocks.push(enriched);
            }
        }

        debug!(
            block = name,
            attrs = block.attrs.len(),
            children = inner_blocks.len(),
            "block enriched"
        );

        Ok(Some(EnrichedBlock {
            name: name.to_string(),
            attrs: block.attrs,
            inner_html: block.inner_html,
            inner_blocks,
            rendered,
        }))
    }
}

impl std::fmt::Debug for BlockEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockEnricher")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

/// Declared schemas plus the synthesized anchor when supported
fn schema_set(block_type: &BlockType) -> Cow<'_, SchemaSet> {
    if block_type.supports.anchor {
        let mut schemas = block_type.attributes.clone();
        schemas.insert(ANCHOR_ATTRIBUTE.to_string(), AttributeSchema::anchor());
        Cow::Owned(schemas)
    } else {
        Cow::Borrowed(&block_type.attributes)
    }
}
