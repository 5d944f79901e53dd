//! JSON-schema validation and sanitization of resolved attribute values
//!
//! Validation compiles the attribute's `type` and extra keywords with the
//! `jsonschema` crate, once per distinct schema. Sanitization coerces a value into the declared type
//! the way REST endpoints coerce request parameters: numeric strings become
//! numbers, `"false"`/`"0"` become `false`, comma lists become arrays.

use crate::collaborators::SchemaValidator;
use crate::error::ExtractResult;
use blockdata_model::AttributeSchema;
use jsonschema::JSONSchema;
use moka::sync::Cache;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use tracing::warn;

/// Default [`SchemaValidator`] backed by `jsonschema`
///
/// Compiled schemas are kept in a bounded moka cache keyed by their JSON
/// text; a schema that fails to compile is remembered as `None`.
#[derive(Clone)]
pub struct JsonSchemaValidator {
    compiled: Cache<String, Option<Arc<JSONSchema>>>,
}

impl JsonSchemaValidator {
    /// Create validator holding up to 1,024 compiled schemas
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1_024)
    }

    /// Create validator holding up to `max_capacity` compiled schemas
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            compiled: Cache::new(max_capacity),
        }
    }

    fn compile(&self, schema: &AttributeSchema) -> Option<Arc<JSONSchema>> {
        let json = schema.json_schema();
        self.compiled.get_with(json.to_string(), || match JSONSchema::compile(&json) {
            Ok(compiled) => Some(Arc::new(compiled)),
            Err(err) => {
                warn!(error = %err, "attribute schema does not compile");
                None
            }
        })
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("compiled", &self.compiled.entry_count())
            .finish()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: &Value, schema: &AttributeSchema) -> bool {
        // An uncompilable schema cannot reject anything
        self.compile(schema)
            .map_or(true, |compiled| compiled.is_valid(value))
    }

    fn sanitize(&self, value: Value, schema: &AttributeSchema) -> ExtractResult<Value> {
        Ok(coerce(value, schema.kind.as_deref(), schema.keywords.get("items")))
    }
}

fn coerce(value: Value, kind: Option<&str>, items: Option<&Value>) -> Value {
    match kind {
        Some("string") => to_string(value),
        Some("integer") => Value::Number(Number::from(to_f64(&value).trunc() as i64)),
        Some("number") => Number::from_f64(to_f64(&value)).map_or(Value::Null, Value::Number),
        Some("boolean") => Value::Bool(to_bool(&value)),
        Some("array") => {
            let item_kind = items.and_then(|items| items.get("type")).and_then(Value::as_str);
            let nested = items.and_then(|items| items.get("items"));
            Value::Array(
                to_list(value)
                    .into_iter()
                    .map(|item| match item_kind {
                        Some(_) => coerce(item, item_kind, nested),
                        None => item,
                    })
                    .collect(),
            )
        }
        Some("object") => match value {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(Map::new()),
            Value::String(s) if s.is_empty() => Value::Object(Map::new()),
            Value::Array(items) if items.is_empty() => Value::Object(Map::new()),
            other => other,
        },
        Some("null") => Value::Null,
        _ => value,
    }
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s),
        Value::Null => Value::String(String::new()),
        Value::Bool(true) => Value::String("1".to_string()),
        Value::Bool(false) => Value::String(String::new()),
        Value::Number(n) => Value::String(n.to_string()),
        // Structured values have no faithful string form; leave them be
        other => other,
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

fn to_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        scalar => vec![scalar],
    }
}
