//! blockdata extraction pipeline
//!
//! Turns content carrying comment-delimited block annotations into a tree
//! of enriched blocks whose attributes are filled from the annotation, from
//! DOM queries over each block's markup, or from entity metadata.
//!
//! # Core Operations
//!
//! - **Resolve**: compute one attribute from its schema ([`AttributeResolver`])
//! - **Enrich**: resolve, render and recurse over one block ([`BlockEnricher`])
//! - **Process**: fingerprint, cache, parse and enrich content ([`BlockPipeline`])
//!
//! # Architecture
//!
//! ```text
//! content → BlockParser → BlockNode tree → BlockEnricher → EnrichedBlock tree
//!     │                                        ↓
//!     └── Fingerprint ── CacheStore      AttributeResolver → DomQuery / MetadataStore
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use blockdata_core::{BlockPipeline, InMemoryBlockTypeRegistry, PipelineConfig};
//! use std::sync::Arc;
//!
//! let pipeline = BlockPipeline::builder()
//!     .parser(Arc::new(my_parser))
//!     .registry(Arc::new(registry))
//!     .renderer(Arc::new(my_renderer))
//!     .dom(Arc::new(my_dom))
//!     .config(PipelineConfig::new().with_cache_expiration_secs(3600))
//!     .build()?;
//!
//! let blocks = pipeline.process(&post_content, post_id)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod enricher;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod validation;

/// Identifier of the entity owning the content; 0 means none
pub type EntityId = u64;

// Re-exports for convenience
pub use cache::{CacheScope, CacheStats, MokaCacheStore};
pub use collaborators::{
    BlockParser, BlockRenderer, BlockTypeRegistry, CacheStore, DomQuery, EntityMetadata,
    MetadataStore, NoShortcodes, NodeSet, SchemaValidator, ShortcodeExpander,
};
pub use config::{Deployment, PipelineConfig};
pub use enricher::BlockEnricher;
pub use error::{ExtractError, ExtractResult};
pub use hooks::{HookContext, PipelineHooks};
pub use metadata::{InMemoryMetadataStore, NoMetadata};
pub use pipeline::{BlockPipeline, BlockPipelineBuilder};
pub use registry::InMemoryBlockTypeRegistry;
pub use resolver::AttributeResolver;
pub use validation::JsonSchemaValidator;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the pipeline
    pub use crate::collaborators::{
        BlockParser, BlockRenderer, BlockTypeRegistry, DomQuery, MetadataStore, NodeSet,
    };
    pub use crate::config::PipelineConfig;
    pub use crate::error::{ExtractError, ExtractResult};
    pub use crate::pipeline::BlockPipeline;
    pub use crate::EntityId;
    pub use blockdata_model::{
        AttributeSchema, AttributeSource, BlockNode, BlockType, EnrichedBlock, Fingerprint,
    };
}
