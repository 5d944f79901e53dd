//! Attribute resolution
//!
//! Computes one attribute value from its [`AttributeSchema`] and the block's
//! HTML fragment:
//!
//! 1. extract from the source (DOM query or entity metadata)
//! 2. fall back to the schema default when nothing was extracted
//! 3. sanitize when the schema declares a type the value does not satisfy
//!
//! `query` sources recurse into their sub-schemas once per matched node,
//! bounded by the configured maximum depth.

use crate::collaborators::{DomQuery, MetadataStore, SchemaValidator};
use crate::config::DEFAULT_MAX_QUERY_DEPTH;
use crate::error::ExtractResult;
use crate::EntityId;
use blockdata_model::{AttributeSchema, AttributeSource, SchemaSet};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{trace, warn};

/// Resolves attribute schemas against HTML fragments
#[derive(Clone)]
pub struct AttributeResolver {
    dom: Arc<dyn DomQuery>,
    metadata: Arc<dyn MetadataStore>,
    validator: Arc<dyn SchemaValidator>,
    max_query_depth: usize,
}

impl AttributeResolver {
    /// Create resolver over the given collaborators
    #[must_use]
    pub fn new(
        dom: Arc<dyn DomQuery>,
        metadata: Arc<dyn MetadataStore>,
        validator: Arc<dyn SchemaValidator>,
    ) -> Self {
        Self {
            dom,
            metadata,
            validator,
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
        }
    }

    /// With `query` nesting limit
    #[inline]
    #[must_use]
    pub fn with_max_query_depth(mut self, depth: usize) -> Self {
        self.max_query_depth = depth;
        self
    }

    /// Resolve one attribute
    ///
    /// Returns `Value::Null` when neither the source nor the default yields
    /// a value.
    ///
    /// # Errors
    /// Propagates DOM, metadata and sanitizer failures
    pub fn resolve(
        &self,
        schema: &AttributeSchema,
        html: &str,
        entity_id: EntityId,
    ) -> ExtractResult<Value> {
        self.resolve_at(schema, html, entity_id, 1)
    }

    fn resolve_at(
        &self,
        schema: &AttributeSchema,
        html: &str,
        entity_id: EntityId,
        depth: usize,
    ) -> ExtractResult<Value> {
        let extracted = self.extract(schema, html, entity_id, depth)?;
        trace!(
            source = schema.source.kind(),
            selector = ?schema.source.selector(),
            found = extracted.is_some(),
            "attribute extracted"
        );

        let value = match extracted.filter(|value| !value.is_null()) {
            Some(value) => value,
            None => match &schema.default {
                Some(default) => default.clone(),
                None => return Ok(Value::Null),
            },
        };

        if schema.kind.is_some() && !self.validator.validate(&value, schema) {
            return self.validator.sanitize(value, schema);
        }
        Ok(value)
    }

    fn extract(
        &self,
        schema: &AttributeSchema,
        html: &str,
        entity_id: EntityId,
        depth: usize,
    ) -> ExtractResult<Option<Value>> {
        let html = html.trim();
        let value = match &schema.source {
            AttributeSource::None => None,
            AttributeSource::Attribute {
                selector,
                attribute,
            } => self
                .dom
                .query(html, selector.as_deref())?
                .attr(attribute)
                .map(Value::String),
            AttributeSource::Html { selector } => {
                let nodes = self.dom.query(html, selector.as_deref())?;
                (!nodes.is_empty()).then(|| Value::String(nodes.html()))
            }
            AttributeSource::Text { selector } => {
                let nodes = self.dom.query(html, selector.as_deref())?;
                (!nodes.is_empty()).then(|| Value::String(nodes.text()))
            }
            AttributeSource::Query {
                selector: Some(selector),
                query,
            } => self.query_each(selector, query, html, entity_id, depth)?,
            AttributeSource::Query { selector: None, .. } => None,
            AttributeSource::Meta { key } if entity_id != 0 => self.metadata.get(entity_id, key)?,
            AttributeSource::Meta { .. } => None,
        };
        Ok(value)
    }

    /// One entry per matched node that yielded at least one non-null sub-result
    ///
    /// `None` when no node yielded any sub-result.
    fn query_each(
        &self,
        selector: &str,
        query: &SchemaSet,
        html: &str,
        entity_id: EntityId,
        depth: usize,
    ) -> ExtractResult<Option<Value>> {
        if depth > self.max_query_depth {
            warn!(
                selector,
                depth,
                limit = self.max_query_depth,
                "query nesting limit reached, leaving attribute unresolved"
            );
            return Ok(None);
        }

        let nodes = self.dom.query(html, Some(selector))?;
        let mut entries = Vec::with_capacity(nodes.len());

        for markup in nodes.outer_html_each() {
            let mut entry = Map::new();
            for (key, sub_schema) in query {
                let value = self.resolve_at(sub_schema, &markup, entity_id, depth + 1)?;
                if !value.is_null() {
                    entry.insert(key.clone(), value);
                }
            }
            if !entry.is_empty() {
                entries.push(Value::Object(entry));
            }
        }

        Ok((!entries.is_empty()).then_some(Value::Array(entries)))
    }
}

impl std::fmt::Debug for AttributeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeResolver")
            .field("max_query_depth", &self.max_query_depth)
            .finish_non_exhaustive()
    }
}
