//! In-memory block type registry
//!
//! Provides [`InMemoryBlockTypeRegistry`], a name → [`BlockType`] map that
//! can be filled programmatically or from `block.json`-style documents.

use crate::collaborators::BlockTypeRegistry;
use crate::error::ExtractResult;
use blockdata_model::BlockType;
use std::collections::HashMap;

/// Registry of block types keyed by block name
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlockTypeRegistry {
    types: HashMap<String, BlockType>,
}

impl InMemoryBlockTypeRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register a block type, replacing any previous one with that name
    pub fn register(&mut self, name: impl Into<String>, block_type: BlockType) -> &mut Self {
        self.types.insert(name.into(), block_type);
        self
    }

    /// Register a block type from its JSON definition
    ///
    /// # Errors
    /// Returns error if the document is not a valid block type
    pub fn register_json(&mut self, name: impl Into<String>, json: &str) -> ExtractResult<()> {
        let block_type: BlockType = serde_json::from_str(json)?;
        self.types.insert(name.into(), block_type);
        Ok(())
    }

    /// Check if a block name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

impl BlockTypeRegistry for InMemoryBlockTypeRegistry {
    fn lookup(&self, name: &str) -> Option<BlockType> {
        self.types.get(name).cloned()
    }
}
