//! Error types for the extraction pipeline
//!
//! Missing block types, empty DOM matches and unusable cache payloads are
//! not errors; they degrade to raw attributes, defaults and cache misses.
//! What remains is collaborator failure, which is propagated to the caller
//! unchanged.

use crate::EntityId;
use blockdata_model::DigestError;

/// Errors surfaced by [`BlockPipeline`](crate::BlockPipeline) and its parts
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Block parser failed on the raw content
    #[error("block parser failed: {0}")]
    Parse(String),

    /// Block renderer failed
    #[error("render failed for block '{block}': {message}")]
    Render {
        /// Name of the block being rendered
        block: String,
        /// Renderer message
        message: String,
    },

    /// Shortcode expansion failed
    #[error("shortcode expansion failed: {0}")]
    Shortcode(String),

    /// DOM query collaborator failed
    #[error("dom query failed for selector {selector:?}: {message}")]
    Dom {
        /// Selector being queried, `None` for a root query
        selector: Option<String>,
        /// DOM engine message
        message: String,
    },

    /// Metadata store failed
    #[error("metadata store failed for entity {entity_id}: {message}")]
    Metadata {
        /// Entity being read
        entity_id: EntityId,
        /// Store message
        message: String,
    },

    /// Cache store failed
    #[error("cache store failed: {0}")]
    Cache(String),

    /// Schema sanitization failed
    #[error("sanitization failed: {0}")]
    Sanitize(String),

    /// Fingerprint could not be computed
    #[error("fingerprint failed: {0}")]
    Fingerprint(#[from] DigestError),

    /// JSON (de)serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Pipeline built without a required collaborator
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl ExtractError {
    /// Create render error for block
    pub fn render(block: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            block: block.into(),
            message: message.into(),
        }
    }

    /// Create DOM error for selector
    pub fn dom(selector: Option<&str>, message: impl Into<String>) -> Self {
        Self::Dom {
            selector: selector.map(str::to_string),
            message: message.into(),
        }
    }

    /// Create metadata error for entity
    pub fn metadata(entity_id: EntityId, message: impl Into<String>) -> Self {
        Self::Metadata {
            entity_id,
            message: message.into(),
        }
    }
}

/// Result type alias for extraction operations
pub type ExtractResult<T> = Result<T, ExtractError>;
