//! Attribute schema DSL
//!
//! Block types declare, per attribute, where its value comes from. The
//! registry format is flat JSON (`{"type", "source", "selector", "attribute",
//! "query", "meta", "default", ...}`); it is decoded into the closed
//! [`AttributeSource`] enum so that every source kind is matched exhaustively.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Ordered attribute schemas keyed by attribute name
pub type SchemaSet = IndexMap<String, AttributeSchema>;

/// Where an attribute's value is extracted from
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeSource {
    /// No source; only the default applies
    #[default]
    None,
    /// An HTML attribute of the selected node
    Attribute {
        /// CSS selector; `None` targets the fragment root
        selector: Option<String>,
        /// HTML attribute name
        attribute: String,
    },
    /// Inner HTML of the selected node
    Html {
        /// CSS selector; `None` targets the fragment root
        selector: Option<String>,
    },
    /// Text content of the selected node
    Text {
        /// CSS selector; `None` targets the fragment root
        selector: Option<String>,
    },
    /// One entry per selected node, each resolved with nested schemas
    Query {
        /// CSS selector; a query without one yields nothing
        selector: Option<String>,
        /// Sub-schemas resolved against each matched node
        query: SchemaSet,
    },
    /// A value from the entity metadata store
    Meta {
        /// Metadata key
        key: String,
    },
}

impl AttributeSource {
    /// Registry name of this source kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Attribute { .. } => "attribute",
            Self::Html { .. } => "html",
            Self::Text { .. } => "text",
            Self::Query { .. } => "query",
            Self::Meta { .. } => "meta",
        }
    }

    /// Selector for DOM-backed sources
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Attribute { selector, .. }
            | Self::Html { selector }
            | Self::Text { selector }
            | Self::Query { selector, .. } => selector.as_deref(),
            Self::None | Self::Meta { .. } => None,
        }
    }
}

/// Declarative rule computing one attribute value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawAttributeSchema", into = "RawAttributeSchema")]
pub struct AttributeSchema {
    /// JSON type name (`string`, `number`, `array`, ...)
    pub kind: Option<String>,
    /// Value source
    pub source: AttributeSource,
    /// Fallback when the source yields nothing
    pub default: Option<Value>,
    /// Remaining JSON-schema keywords (`enum`, `items`, ...) used for validation
    pub keywords: Map<String, Value>,
}

impl AttributeSchema {
    /// Schema with the given source and nothing else
    #[must_use]
    pub fn new(source: AttributeSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Schema for the synthesized `anchor` attribute: the root node's `id`
    #[must_use]
    pub fn anchor() -> Self {
        Self::new(AttributeSource::Attribute {
            selector: None,
            attribute: "id".to_string(),
        })
        .with_type("string")
        .with_default("")
    }

    /// Set the JSON type
    #[must_use]
    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Add a JSON-schema keyword
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(keyword.into(), value.into());
        self
    }

    /// JSON schema used to validate and sanitize resolved values
    ///
    /// Only `type` and the extra keywords take part; source fields do not.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut schema = self.keywords.clone();
        if let Some(kind) = &self.kind {
            schema.insert("type".to_string(), Value::String(kind.clone()));
        }
        Value::Object(schema)
    }
}

/// Capability flags of a block type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockSupports {
    /// Whether the block carries an `anchor` attribute sourced from its root `id`
    #[serde(default, deserialize_with = "truthy")]
    pub anchor: bool,
    /// Other capabilities, kept verbatim
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A registered block type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockType {
    /// Declared attribute schemas
    #[serde(default)]
    pub attributes: SchemaSet,
    /// Capability flags
    #[serde(default)]
    pub supports: BlockSupports,
}

impl BlockType {
    /// Block type with the given attributes and no supports
    #[must_use]
    pub fn new(attributes: SchemaSet) -> Self {
        Self {
            attributes,
            supports: BlockSupports::default(),
        }
    }

    /// Add one attribute schema
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, schema: AttributeSchema) -> Self {
        self.attributes.insert(name.into(), schema);
        self
    }

    /// Toggle anchor support
    #[must_use]
    pub fn with_anchor_support(mut self, anchor: bool) -> Self {
        self.supports.anchor = anchor;
        self
    }
}

/// Flat registry representation of [`AttributeSchema`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawAttributeSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<SchemaSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(flatten)]
    keywords: Map<String, Value>,
}

impl From<RawAttributeSchema> for AttributeSchema {
    fn from(raw: RawAttributeSchema) -> Self {
        let RawAttributeSchema {
            kind,
            source,
            selector,
            attribute,
            query,
            meta,
            default,
            keywords,
        } = raw;

        let source = match (source.as_deref(), attribute, query, meta) {
            (None | Some("none"), ..) => AttributeSource::None,
            (Some("attribute"), Some(attribute), ..) => AttributeSource::Attribute {
                selector,
                attribute,
            },
            (Some("html"), ..) => AttributeSource::Html { selector },
            (Some("text"), ..) => AttributeSource::Text { selector },
            (Some("query"), _, Some(query), _) => AttributeSource::Query { selector, query },
            (Some("meta"), .., Some(key)) => AttributeSource::Meta { key },
            (Some(name @ ("attribute" | "query" | "meta")), ..) => {
                warn!(source = name, "attribute source lacks its field, only the default applies");
                AttributeSource::None
            }
            (Some(other), ..) => {
                warn!(source = other, "unknown attribute source, only the default applies");
                AttributeSource::None
            }
        };

        Self {
            kind,
            source,
            default,
            keywords,
        }
    }
}

impl From<AttributeSchema> for RawAttributeSchema {
    fn from(schema: AttributeSchema) -> Self {
        let mut raw = Self {
            kind: schema.kind,
            default: schema.default,
            keywords: schema.keywords,
            ..Self::default()
        };
        match schema.source {
            AttributeSource::None => {}
            AttributeSource::Attribute {
                selector,
                attribute,
            } => {
                raw.source = Some("attribute".into());
                raw.selector = selector;
                raw.attribute = Some(attribute);
            }
            AttributeSource::Html { selector } => {
                raw.source = Some("html".into());
                raw.selector = selector;
            }
            AttributeSource::Text { selector } => {
                raw.source = Some("text".into());
                raw.selector = selector;
            }
            AttributeSource::Query { selector, query } => {
                raw.source = Some("query".into());
                raw.selector = selector;
                raw.query = Some(query);
            }
            AttributeSource::Meta { key } => {
                raw.source = Some("meta".into());
                raw.meta = Some(key);
            }
        }
        raw
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    })
}
