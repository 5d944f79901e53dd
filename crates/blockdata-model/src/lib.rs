//! blockdata data model
//!
//! Plain data shared by the extraction pipeline and its collaborators.
//!
//! # Core Concepts
//!
//! - [`BlockNode`]: a node of the parsed block tree
//! - [`EnrichedBlock`]: a block with resolved attributes and rendered HTML
//! - [`AttributeSchema`] / [`AttributeSource`]: how one attribute is computed
//! - [`BlockType`]: attribute schemas plus capability flags of a block name
//! - [`Fingerprint`]: content + metadata digest used as a cache key
//!
//! # Example
//!
//! ```rust,ignore
//! use blockdata_model::{AttributeSchema, AttributeSource, BlockType};
//!
//! let paragraph = BlockType::default().with_attribute(
//!     "content",
//!     AttributeSchema::new(AttributeSource::Html { selector: Some("p".into()) })
//!         .with_type("string"),
//! );
//! ```

#![warn(unreachable_pub)]

mod block;
mod fingerprint;
mod schema;

pub use block::{Attributes, BlockNode, EnrichedBlock};
pub use fingerprint::{Digest, DigestError, Fingerprint, CACHE_KEY_PREFIX};
pub use schema::{AttributeSchema, AttributeSource, BlockSupports, BlockType, SchemaSet};
