//! Argument schemas.
//!
//! Two phases, both failing with `WardenError::Validation` naming the field:
//!
//! 1. Structural: every `required` key is present and every present key
//!    declared under `properties` has the declared primitive `type`.
//! 2. JSON Schema: the full document (enums, bounds, patterns) checked with
//!    the `jsonschema` crate.

use jsonschema::Validator;
use serde_json::Value;

use warden_contracts::{
    error::{WardenError, WardenResult},
    oracle::Arguments,
};

/// Check `schema` is an object schema with `type` and `properties` and
/// compiles as JSON Schema.
pub fn compile(schema: &Value) -> WardenResult<Validator> {
    let Some(object) = schema.as_object() else {
        return Err(WardenError::validation("schema", "tool schema must be a JSON object"));
    };
    for key in ["type", "properties"] {
        if !object.contains_key(key) {
            return Err(WardenError::validation(
                "schema",
                format!("tool schema must declare '{}'", key),
            ));
        }
    }
    if !object.get("properties").is_some_and(Value::is_object) {
        return Err(WardenError::validation("schema", "'properties' must be an object"));
    }
    jsonschema::validator_for(schema)
        .map_err(|e| WardenError::validation("schema", format!("invalid JSON Schema document: {}", e)))
}

/// Run both phases against `arguments`.
pub fn check_arguments(schema: &Value, validator: &Validator, arguments: &Arguments) -> WardenResult<()> {
    check_structure(schema, arguments)?;

    let instance = Value::Object(arguments.clone());
    if let Some(error) = validator.iter_errors(&instance).next() {
        let path = error.instance_path.to_string();
        let field = path.trim_start_matches('/');
        return Err(WardenError::validation(
            if field.is_empty() { "arguments" } else { field },
            error.to_string(),
        ));
    }
    Ok(())
}

fn check_structure(schema: &Value, arguments: &Arguments) -> WardenResult<()> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(key) {
                return Err(WardenError::validation(key, "required argument is missing"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in arguments {
        let Some(declared) = properties.get(key).and_then(|p| p.get("type")) else {
            continue;
        };
        let matches = match declared {
            Value::String(ty) => has_type(value, ty),
            // `"type": ["string", "null"]`
            Value::Array(types) => types.iter().filter_map(Value::as_str).any(|ty| has_type(value, ty)),
            _ => true,
        };
        if !matches {
            return Err(WardenError::validation(
                key.as_str(),
                format!("expected {}, got {}", declared, type_name(value)),
            ));
        }
    }
    Ok(())
}

fn has_type(value: &Value, ty: &str) -> bool {
    match ty {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
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
