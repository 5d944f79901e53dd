//! Block pipeline - main entry point
//!
//! Provides the fingerprint-cached path from raw content to enriched blocks:
//!
//! ```text
//! content → fingerprint → cache hit? ─yes→ output hooks → caller
//!                              │no
//!                              ↓
//!                 parser → post-parse hooks → enricher (per top-level node)
//!                              ↓
//!                 pre-cache-write hooks → cache store → output hooks → caller
//! ```

use crate::cache::{CacheScope, MokaCacheStore};
use crate::collaborators::{
    BlockParser, BlockRenderer, BlockTypeRegistry, CacheStore, DomQuery, MetadataStore,
    NoShortcodes, SchemaValidator, ShortcodeExpander,
};
use crate::config::PipelineConfig;
use crate::enricher::BlockEnricher;
use crate::error::{ExtractError, ExtractResult};
use crate::hooks::{HookContext, PipelineHooks};
use crate::metadata::NoMetadata;
use crate::resolver::AttributeResolver;
use crate::validation::JsonSchemaValidator;
use crate::EntityId;
use blockdata_model::{EnrichedBlock, Fingerprint};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Content → enriched block tree, with caching
///
/// Built with [`BlockPipeline::builder`]. All collaborators are shared
/// behind `Arc`, so a pipeline is cheap to clone and safe to share.
#[derive(Clone)]
pub struct BlockPipeline {
    parser: Arc<dyn BlockParser>,
    enricher: BlockEnricher,
    metadata: Arc<dyn MetadataStore>,
    cache: Arc<dyn CacheStore>,
    config: PipelineConfig,
    hooks: Arc<PipelineHooks>,
}

impl BlockPipeline {
    /// Start building a pipeline
    #[inline]
    #[must_use]
    pub fn builder() -> BlockPipelineBuilder {
        BlockPipelineBuilder::default()
    }

    /// Process content into enriched top-level blocks
    ///
    /// `entity_id = 0` means no entity context: `meta` sources resolve to
    /// their defaults and the fingerprint ignores metadata.
    ///
    /// # Errors
    /// Propagates collaborator failures; unknown block types and empty
    /// DOM matches are not errors
    pub fn process(&self, content: &str, entity_id: EntityId) -> ExtractResult<Vec<EnrichedBlock>> {
        let span = info_span!("process", entity_id, content_len = content.len());
        let _enter = span.enter();

        let ctx = HookContext {
            content,
            entity_id,
            was_cached: false,
        };

        let slot = if self.config.cache_enabled {
            let key = self.fingerprint(content, entity_id)?.cache_key();
            let scope = self.config.cache_scope();
            if let Some(blocks) = self.cached(scope, &key)? {
                debug!(%scope, key = %key, blocks = blocks.len(), "cache hit");
                let hit = HookContext {
                    was_cached: true,
                    ..ctx
                };
                return Ok(self.hooks.apply_output(blocks, &hit));
            }
            debug!(%scope, key = %key, "cache miss");
            Some((scope, key))
        } else {
            None
        };

        let tree = self.parser.parse(content)?;
        let tree = self.hooks.apply_post_parse(tree, &ctx);

        let mut output = Vec::with_capacity(tree.len());
        for node in &tree {
            if let Some(block) = self.enricher.enrich(node, entity_id)? {
                output.push(block);
            }
        }

        if let Some((scope, key)) = slot {
            output = self.hooks.apply_pre_cache_write(output, &ctx);
            let payload = serde_json::to_value(&output)?;
            self.cache.set(scope, &key, payload, self.config.cache_ttl())?;
            debug!(%scope, key = %key, blocks = output.len(), "cache stored");
        }

        Ok(self.hooks.apply_output(output, &ctx))
    }

    /// Fingerprint a `process` call would use
    ///
    /// # Errors
    /// Propagates metadata store failures
    pub fn fingerprint(&self, content: &str, entity_id: EntityId) -> ExtractResult<Fingerprint> {
        let fingerprint = Fingerprint::of_content(content);
        if entity_id == 0 {
            return Ok(fingerprint);
        }
        let metadata = self.metadata.get_all(entity_id)?;
        Ok(fingerprint.with_metadata(&metadata)?)
    }

    /// Drop the cached result for `content` and `entity_id`
    ///
    /// Returns whether an entry was removed.
    ///
    /// # Errors
    /// Propagates metadata and cache store failures
    pub fn invalidate(&self, content: &str, entity_id: EntityId) -> ExtractResult<bool> {
        let key = self.fingerprint(content, entity_id)?.cache_key();
        let removed = self.cache.delete(self.config.cache_scope(), &key)?;
        debug!(key = %key, removed, "cache invalidated");
        Ok(removed)
    }

    /// Get the configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the block enricher
    #[inline]
    #[must_use]
    pub fn enricher(&self) -> &BlockEnricher {
        &self.enricher
    }

    /// Decode a cached payload; anything but a non-empty block array is a miss
    fn cached(&self, scope: CacheScope, key: &str) -> ExtractResult<Option<Vec<EnrichedBlock>>> {
        let Some(payload) = self.cache.get(scope, key)? else {
            return Ok(None);
        };
        match payload {
            Value::Array(items) if !items.is_empty() => {
                match serde_json::from_value(Value::Array(items)) {
                    Ok(blocks) => Ok(Some(blocks)),
                    Err(err) => {
                        debug!(key, error = %err, "discarding undecodable cache payload");
                        Ok(None)
                    }
                }
            }
            _ => {
                debug!(key, "discarding empty or non-array cache payload");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for BlockPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPipeline")
            .field("config", &self.config)
            .field("enricher", &self.enricher)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BlockPipeline`]
///
/// Parser, registry, renderer and DOM engine are required. Shortcode
/// expansion defaults to none, metadata to empty, the cache to an
/// in-process moka store and validation to `jsonschema`.
#[derive(Default)]
pub struct BlockPipelineBuilder {
    parser: Option<Arc<dyn BlockParser>>,
    registry: Option<Arc<dyn BlockTypeRegistry>>,
    renderer: Option<Arc<dyn BlockRenderer>>,
    dom: Option<Arc<dyn DomQuery>>,
    shortcodes: Option<Arc<dyn ShortcodeExpander>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    cache: Option<Arc<dyn CacheStore>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    config: PipelineConfig,
    hooks: PipelineHooks,
}

impl BlockPipelineBuilder {
    /// Set the block parser
    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn BlockParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Set the block type registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn BlockTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the block renderer
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn BlockRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the DOM query engine
    #[must_use]
    pub fn dom(mut self, dom: Arc<dyn DomQuery>) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Set the shortcode expander
    #[must_use]
    pub fn shortcodes(mut self, shortcodes: Arc<dyn ShortcodeExpander>) -> Self {
        self.shortcodes = Some(shortcodes);
        self
    }

    /// Set the metadata store
    #[must_use]
    pub fn metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the cache store
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the schema validator
    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register hooks through a closure
    #[must_use]
    pub fn hooks(mut self, register: impl FnOnce(&mut PipelineHooks)) -> Self {
        register(&mut self.hooks);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// Returns `ExtractError::MissingCollaborator` naming the first
    /// required collaborator that was not set
    pub fn build(self) -> ExtractResult<BlockPipeline> {
        let parser = self
            .parser
            .ok_or(ExtractError::MissingCollaborator("parser"))?;
        let registry = self
            .registry
            .ok_or(ExtractError::MissingCollaborator("registry"))?;
        let renderer = self
            .renderer
            .ok_or(ExtractError::MissingCollaborator("renderer"))?;
        let dom = self.dom.ok_or(ExtractError::MissingCollaborator("dom"))?;

        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(NoMetadata) as Arc<dyn MetadataStore>);
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(JsonSchemaValidator::new()) as Arc<dyn SchemaValidator>);
        let shortcodes = self
            .shortcodes
            .unwrap_or_else(|| Arc::new(NoShortcodes) as Arc<dyn ShortcodeExpander>);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MokaCacheStore::default()) as Arc<dyn CacheStore>);

        let resolver = AttributeResolver::new(dom, Arc::clone(&metadata), validator)
            .with_max_query_depth(self.config.max_query_depth);
        let enricher = BlockEnricher::new(registry, renderer, shortcodes, resolver);

        Ok(BlockPipeline {
            parser,
            enricher,
            metadata,
            cache,
            config: self.config,
            hooks: Arc::new(self.hooks),
        })
    }
}

impl std::fmt::Debug for BlockPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPipelineBuilder")
            .field("parser", &self.parser.is_some())
            .field("registry", &self.registry.is_some())
            .field("renderer", &self.renderer.is_some())
            .field("dom", &self.dom.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
