//! Minimal validation contract for structured output.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{DraupnirError, Result};

/// Shape a structured value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<Schema>),
    Object {
        properties: BTreeMap<String, Schema>,
        required: Vec<String>,
    },
}

impl Schema {
    /// Empty object schema; add fields with [`property`](Self::property)
    /// and [`required_property`](Self::required_property).
    pub fn object() -> Self {
        Self::Object {
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn array(item: Schema) -> Self {
        Self::Array(Box::new(item))
    }

    /// Add an optional property. No-op on non-object schemas.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let Self::Object { properties, .. } = &mut self {
            properties.insert(name.into(), schema);
        }
        self
    }

    /// Add a required property. No-op on non-object schemas.
    pub fn required_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        if let Self::Object {
            properties,
            required,
        } = &mut self
        {
            properties.insert(name.clone(), schema);
            if !required.contains(&name) {
                required.push(name);
            }
        }
        self
    }

    /// Check `value` against this schema. Undeclared object fields are allowed.
    pub fn validate(&self, value: &Value) -> Result<()> {
        self.check(value, "$")
    }

    fn check(&self, value: &Value, path: &str) -> Result<()> {
        let ok = match (self, value) {
            (Self::Any, _) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array(item), Value::Array(items)) => {
                for (i, v) in items.iter().enumerate() {
                    item.check(v, &format!("{path}[{i}]"))?;
                }
                true
            }
            (
                Self::Object {
                    properties,
                    required,
                },
                Value::Object(fields),
            ) => {
                for name in required {
                    if !fields.contains_key(name) {
                        return Err(DraupnirError::SchemaViolation(format!(
                            "{path}: missing required field '{name}'"
                        )));
                    }
                }
                for (name, schema) in properties {
                    if let Some(v) = fields.get(name) {
                        schema.check(v, &format!("{path}.{name}"))?;
                    }
                }
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(DraupnirError::SchemaViolation(format!(
                "{path}: expected {}, found {}",
                self.type_name(),
                value_type(value)
            )))
        }
    }

    /// Smallest value that satisfies this schema: required fields only,
    /// empty arrays, zero numbers, empty strings, `false`, `null` for `Any`.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::String => Value::String(String::new()),
            Self::Number | Self::Integer => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::Array(_) => Value::Array(Vec::new()),
            Self::Object {
                properties,
                required,
            } => {
                let mut out = Map::new();
                for name in required {
                    let value = properties
                        .get(name)
                        .map_or(Value::Null, Schema::default_value);
                    out.insert(name.clone(), value);
                }
                Value::Object(out)
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
            Self::Object { .. } => "object",
        }
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn analysis() -> Schema {
        Schema::object()
            .required_property("language", Schema::String)
            .required_property("ports", Schema::array(Schema::Integer))
            .property("framework", Schema::String)
    }

    #[test]
    fn accepts_conforming_values() {
        let v = json!({"language": "go", "ports": [8080], "extra": true});
        assert!(analysis().validate(&v).is_ok());
    }

    #[test]
    fn reports_path_of_violation() {
        let v = json!({"language": "go", "ports": [8080, "x"]});
        let err = analysis().validate(&v).unwrap_err().to_string();
        assert!(err.contains("$.ports[1]: expected integer, found string"), "{err}");

        let err = analysis().validate(&json!({"ports": []})).unwrap_err().to_string();
        assert!(err.contains("missing required field 'language'"));
    }

    #[test]
    fn default_value_conforms() {
        let schema = analysis();
        let d = schema.default_value();
        assert_eq!(d, json!({"language": "", "ports": []}));
        assert!(schema.validate(&d).is_ok());
    }

    #[test]
    fn integer_rejects_floats() {
        assert!(Schema::Integer.validate(&json!(1.5)).is_err());
        assert!(Schema::Number.validate(&json!(1.5)).is_ok());
    }
}
