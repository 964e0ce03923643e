//! Compiled stream schemas
//!
//! A `JsonSchema` document is compiled once into a tree of `Field`s that the
//! validator walks. Compilation rejects anything the validator cannot check.

use super::types::{JsonSchema, JsonType, SchemaProperty};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Declared type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    DateTime,
    /// Nested object; `open` objects declare no properties and keep every key
    Object {
        fields: BTreeMap<String, Field>,
        open: bool,
    },
    Array(Box<Field>),
}

impl FieldType {
    /// Whether values of this type have a meaningful order (replication keys)
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Integer | FieldType::Number | FieldType::DateTime
        )
    }

    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "date-time",
            FieldType::Object { .. } => "object",
            FieldType::Array(_) => "array",
        }
    }
}

/// A field's type plus nullability
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ty: FieldType,
    pub nullable: bool,
}

impl Field {
    /// A nullable field of the given type
    pub fn nullable(ty: FieldType) -> Self {
        Self { ty, nullable: true }
    }

    /// A non-null field of the given type
    pub fn required(ty: FieldType) -> Self {
        Self {
            ty,
            nullable: false,
        }
    }
}

/// Compiled schema for one stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSchema {
    stream: String,
    fields: BTreeMap<String, Field>,
    primary_key: Vec<String>,
    document: JsonSchema,
}

impl StreamSchema {
    /// Compile a schema document for a stream
    pub fn compile(stream: &str, document: &JsonSchema, primary_key: &[String]) -> Result<Self> {
        let top: Vec<JsonType> = document.json_type.non_null_types();
        if top != [JsonType::Object] {
            return Err(Error::schema(stream, "top-level type must be \"object\""));
        }

        let mut fields = BTreeMap::new();
        for (name, property) in &document.properties {
            fields.insert(name.clone(), compile_property(stream, name, property)?);
        }

        for key in primary_key {
            if !fields.contains_key(key) {
                return Err(Error::schema(
                    stream,
                    format!("primary key field '{key}' is not declared in the schema"),
                ));
            }
        }

        Ok(Self {
            stream: stream.to_string(),
            fields,
            primary_key: primary_key.to_vec(),
            document: document.clone(),
        })
    }

    /// Stream this schema belongs to
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Top-level fields
    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    /// Look up a top-level field
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Primary key field names
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// The source document, as emitted in SCHEMA messages
    pub fn document(&self) -> &JsonSchema {
        &self.document
    }
}

fn compile_property(stream: &str, path: &str, property: &SchemaProperty) -> Result<Field> {
    let nullable = property.is_nullable();
    let types = property.json_type.non_null_types();

    let json_type = match types.as_slice() {
        [single] => *single,
        [] => {
            return Err(Error::schema(
                stream,
                format!("field '{path}' has no non-null type"),
            ))
        }
        _ => {
            return Err(Error::schema(
                stream,
                format!("field '{path}' declares several types; only one plus \"null\" is supported"),
            ))
        }
    };

    let ty = match json_type {
        JsonType::String => match property.format.as_deref() {
            Some("date-time" | "date") => FieldType::DateTime,
            _ => FieldType::String,
        },
        JsonType::Integer => FieldType::Integer,
        JsonType::Number => FieldType::Number,
        JsonType::Boolean => FieldType::Boolean,
        JsonType::Object => match &property.properties {
            Some(properties) => {
                let mut fields = BTreeMap::new();
                for (name, nested) in properties {
                    let nested_path = format!("{path}.{name}");
                    fields.insert(name.clone(), compile_property(stream, &nested_path, nested)?);
                }
                FieldType::Object {
                    fields,
                    open: false,
                }
            }
            None => FieldType::Object {
                fields: BTreeMap::new(),
                open: true,
            },
        },
        JsonType::Array => {
            let items = property.items.as_ref().ok_or_else(|| {
                Error::schema(stream, format!("array field '{path}' must declare items"))
            })?;
            FieldType::Array(Box::new(compile_property(
                stream,
                &format!("{path}[]"),
                items,
            )?))
        }
        JsonType::Null => {
            return Err(Error::schema(
                stream,
                format!("field '{path}' has no non-null type"),
            ))
        }
    };

    Ok(Field { ty, nullable })
}
