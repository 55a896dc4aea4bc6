//! Tool descriptors and argument schemas.
//!
//! Servers advertise an `inputSchema` in JSON Schema form. Only the subset
//! needed for client-side validation is interpreted: top-level `properties`,
//! `required`, `default`, `enum`, `type` and `additionalProperties`. The raw
//! schema is kept alongside for anything that needs the full document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON type of a single argument field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    /// No type constraint declared.
    Any,
    /// Any of several types (`"type": ["string", "null"]`).
    Union(Vec<FieldType>),
}

impl FieldType {
    fn from_schema_name(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            "null" => Self::Null,
            _ => Self::Any,
        }
    }

    fn from_schema(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(name)) => Self::from_schema_name(name),
            Some(Value::Array(names)) => {
                let kinds: Vec<Self> = names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(Self::from_schema_name)
                    .collect();
                match kinds.len() {
                    0 => Self::Any,
                    1 => kinds.into_iter().next().unwrap_or(Self::Any),
                    _ => Self::Union(kinds),
                }
            }
            _ => Self::Any,
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => match value {
                Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
                _ => false,
            },
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Null => value.is_null(),
            Self::Union(kinds) => kinds.iter().any(|k| k.accepts(value)),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Integer => f.write_str("integer"),
            Self::Boolean => f.write_str("boolean"),
            Self::Array => f.write_str("array"),
            Self::Object => f.write_str("object"),
            Self::Null => f.write_str("null"),
            Self::Any => f.write_str("any"),
            Self::Union(kinds) => {
                let names: Vec<String> = kinds.iter().map(ToString::to_string).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

/// One argument field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values when the schema declares an `enum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

/// A schema violation found before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("argument '{field}': {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Structured view of a tool's `inputSchema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
    /// False when the schema sets `additionalProperties: false`.
    pub allow_additional: bool,
    /// The schema exactly as the server sent it.
    pub raw: Value,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            allow_additional: true,
            raw: Value::Object(Map::new()),
        }
    }
}

impl InputSchema {
    /// Interpret a JSON Schema object. Missing or malformed parts degrade to
    /// "no constraint" rather than failing discovery.
    pub fn from_json_schema(schema: &Value) -> Self {
        let Some(obj) = schema.as_object() else {
            return Self::default();
        };

        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = obj
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| FieldSpec {
                        name: name.clone(),
                        field_type: FieldType::from_schema(prop.get("type")),
                        required: required.contains(&name.as_str()),
                        default: prop.get("default").cloned(),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        allowed: prop.get("enum").and_then(Value::as_array).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let allow_additional = !matches!(obj.get("additionalProperties"), Some(Value::Bool(false)));

        Self {
            fields,
            allow_additional,
            raw: schema.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate an argument payload. `null` counts as an empty object.
    ///
    /// A required field that declares a default may be omitted; the server
    /// applies its own default.
    pub fn validate(&self, args: &Value) -> Result<(), SchemaViolation> {
        let empty = Map::new();
        let map = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(SchemaViolation::new(
                    "<root>",
                    format!("arguments must be an object, got {}", json_type_name(other)),
                ));
            }
        };

        for field in &self.fields {
            match map.get(&field.name) {
                None => {
                    if field.required && field.default.is_none() {
                        return Err(SchemaViolation::new(&field.name, "required field is missing"));
                    }
                }
                Some(value) => {
                    if !field.field_type.accepts(value) {
                        return Err(SchemaViolation::new(
                            &field.name,
                            format!("expected {}, got {}", field.field_type, json_type_name(value)),
                        ));
                    }
                    if let Some(ref allowed) = field.allowed {
                        if !allowed.contains(value) {
                            return Err(SchemaViolation::new(
                                &field.name,
                                format!("value {value} is not one of the allowed values"),
                            ));
                        }
                    }
                }
            }
        }

        if !self.allow_additional {
            if let Some(unknown) = map.keys().find(|k| self.field(k).is_none()) {
                return Err(SchemaViolation::new(unknown, "unknown field"));
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A tool offered by a connected server.
///
/// Rebuilt from the live `tools/list` response on every handshake; never a
/// source of truth on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within its server, not globally.
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    /// Owning server name.
    pub server: String,
}
