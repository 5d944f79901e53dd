//! Extension points of the pipeline
//!
//! Hooks are ordered lists of transform closures. Each stage threads its
//! value through the registered closures in registration order:
//!
//! - **post-parse**: raw block tree, before enrichment
//! - **pre-cache-write**: enriched output, before it is stored (cache on only)
//! - **output**: enriched output, right before it is returned (hits included)

use crate::EntityId;
use blockdata_model::{BlockNode, EnrichedBlock};

/// Call parameters visible to hooks
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Raw content being processed
    pub content: &'a str,
    /// Entity context, 0 for none
    pub entity_id: EntityId,
    /// Whether the output came from cache
    pub was_cached: bool,
}

type TreeHook = Box<dyn Fn(Vec<BlockNode>, &HookContext<'_>) -> Vec<BlockNode> + Send + Sync>;
type OutputHook =
    Box<dyn Fn(Vec<EnrichedBlock>, &HookContext<'_>) -> Vec<EnrichedBlock> + Send + Sync>;

/// Registered hooks for every stage
#[derive(Default)]
pub struct PipelineHooks {
    post_parse: Vec<TreeHook>,
    pre_cache_write: Vec<OutputHook>,
    output: Vec<OutputHook>,
}

impl PipelineHooks {
    /// Create empty hook set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform over the parsed block tree
    pub fn on_post_parse<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Vec<BlockNode>, &HookContext<'_>) -> Vec<BlockNode> + Send + Sync + 'static,
    {
        self.post_parse.push(Box::new(hook));
        self
    }

    /// Register a transform over output about to be cached
    pub fn on_pre_cache_write<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Vec<EnrichedBlock>, &HookContext<'_>) -> Vec<EnrichedBlock> + Send + Sync + 'static,
    {
        self.pre_cache_write.push(Box::new(hook));
        self
    }

    /// Register a transform over returned output
    pub fn on_output<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Vec<EnrichedBlock>, &HookContext<'_>) -> Vec<EnrichedBlock> + Send + Sync + 'static,
    {
        self.output.push(Box::new(hook));
        self
    }

    pub(crate) fn apply_post_parse(
        &self,
        tree: Vec<BlockNode>,
        ctx: &HookContext<'_>,
    ) -> Vec<BlockNode> {
        self.post_parse.iter().fold(tree, |tree, hook| hook(tree, ctx))
    }

    pub(crate) fn apply_pre_cache_write(
        &self,
        blocks: Vec<EnrichedBlock>,
        ctx: &HookContext<'_>,
    ) -> Vec<EnrichedBlock> {
        self.pre_cache_write
            .iter()
            .fold(blocks, |blocks, hook| hook(blocks, ctx))
    }

    pub(crate) fn apply_output(
        &self,
        blocks: Vec<EnrichedBlock>,
        ctx: &HookContext<'_>,
    ) -> Vec<EnrichedBlock> {
        self.output.iter().fold(blocks, |blocks, hook| hook(blocks, ctx))
    }
}

impl std::fmt::Debug for PipelineHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHooks")
            .field("post_parse", &self.post_parse.len())
            .field("pre_cache_write", &self.pre_cache_write.len())
            .field("output", &self.output.len())
            .finish()
    }
}
