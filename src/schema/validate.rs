//! Record validation and coercion

use super::compile::{Field, FieldType, StreamSchema};
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

/// A record that conforms to its stream schema
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    /// Coerced field values; keys are a subset of the schema's
    pub record: JsonObject,
    /// Undeclared fields that were removed, as dotted paths
    pub dropped_fields: Vec<String>,
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}': {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field
    pub field: String,
    /// What was wrong with it
    pub message: String,
    key_violation: bool,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            key_violation: false,
        }
    }

    /// The failure involves a primary-key field, so the page cannot be trusted
    pub fn is_key_violation(&self) -> bool {
        self.key_violation
    }

    fn on_key(mut self) -> Self {
        self.key_violation = true;
        self
    }
}

impl StreamSchema {
    /// Validate and coerce one raw record
    pub fn validate(&self, raw: &JsonValue) -> Result<ValidatedRecord, ValidationError> {
        let Value::Object(input) = raw else {
            let err = ValidationError::new("$", format!("expected an object, got {}", kind(raw)));
            return Err(if self.primary_key().is_empty() {
                err
            } else {
                err.on_key()
            });
        };

        let mut dropped_fields = Vec::new();
        let mut record = JsonObject::new();

        for (name, value) in input {
            let Some(field) = self.field(name) else {
                dropped_fields.push(name.clone());
                continue;
            };

            let is_key = self.primary_key().iter().any(|k| k == name);
            match coerce(value, field, name, &mut dropped_fields) {
                Ok(coerced) => {
                    record.insert(name.clone(), coerced);
                }
                Err(err) if is_key => return Err(err.on_key()),
                Err(err) => return Err(err),
            }
        }

        for key in self.primary_key() {
            if record.get(key).map_or(true, Value::is_null) {
                return Err(ValidationError::new(key.as_str(), "primary key is missing or null").on_key());
            }
        }

        Ok(ValidatedRecord {
            record,
            dropped_fields,
        })
    }
}

static NULL: Value = Value::Null;

/// Coerce a value to a declared field type
pub fn coerce(
    value: &Value,
    field: &Field,
    path: &str,
    dropped: &mut Vec<String>,
) -> Result<Value, ValidationError> {
    // Empty strings mean "no value" for everything but plain strings
    let value = match value {
        Value::String(s) if s.is_empty() && field.ty != FieldType::String => &NULL,
        other => other,
    };

    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(ValidationError::new(path, "null is not allowed"))
        };
    }

    let mismatch =
        || ValidationError::new(path, format!("expected {}, got {}", field.ty.name(), kind(value)));

    match &field.ty {
        FieldType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(mismatch()),
        },
        FieldType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .and_then(whole_number)
                .map(Value::from)
                .ok_or_else(mismatch),
            Value::String(s) => parse_integer(s.trim()).map(Value::from).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        FieldType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        FieldType::DateTime => match value {
            Value::String(s) if parse_datetime(s).is_some() => Ok(value.clone()),
            Value::String(s) => Err(ValidationError::new(
                path,
                format!("'{s}' is not a valid date-time"),
            )),
            _ => Err(mismatch()),
        },
        FieldType::Object { fields, open } => {
            let Value::Object(input) = value else {
                return Err(mismatch());
            };
            if *open {
                return Ok(value.clone());
            }
            let mut out = JsonObject::new();
            for (name, nested) in input {
                let nested_path = format!("{path}.{name}");
                match fields.get(name) {
                    Some(nested_field) => {
                        out.insert(
                            name.clone(),
                            coerce(nested, nested_field, &nested_path, dropped)?,
                        );
                    }
                    None => dropped.push(nested_path),
                }
            }
            Ok(Value::Object(out))
        }
        FieldType::Array(item) => {
            let Value::Array(items) = value else {
                return Err(mismatch());
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, element) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                let mut item_dropped = Vec::new();
                out.push(coerce(element, item, &item_path, &mut item_dropped)?);
                // report `items[].sku` once, not per element
                for d in item_dropped {
                    let generic = d.replacen(&item_path, &format!("{path}[]"), 1);
                    if !dropped.contains(&generic) {
                        dropped.push(generic);
                    }
                }
            }
            Ok(Value::Array(out))
        }
    }
}

fn whole_number(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
}

/// Parse the date-time shapes the API produces: RFC 3339, naive
/// `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) or a bare `YYYY-MM-DD`.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
