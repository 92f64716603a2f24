//! Response-wrapper types.
//!
//! # Design
//! A `DtoSchema` is a named record of typed fields, declared either in code
//! or in an override manifest. `DtoSchema::construct` validates a raw
//! response mapping against it and produces a `Dto`. Keys the schema does
//! not declare are kept alongside the declared fields so nothing in the
//! response is lost. A `Dto` can be decoded into a concrete Rust struct with
//! `into_typed` when the caller has one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ValidationError, ValidationFailure};
use crate::transport::Params;

/// Declared type of one DTO field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "string")]
    Str,
    /// Any JSON number; stored as a float.
    Float,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "dict")]
    Object,
    #[serde(alias = "list")]
    Array,
    Any,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Float => "float",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }

    /// Check `value` against this type, returning the value to store.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Any, v) => Some(v.clone()),
            (FieldType::Str, Value::String(_))
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::Object, Value::Object(_))
            | (FieldType::Array, Value::Array(_)) => Some(value.clone()),
            (FieldType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (FieldType::Float, Value::Number(n)) => n.as_f64().map(Value::from),
            _ => None,
        }
    }
}

/// Name of a JSON value's kind, for error messages.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtoField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Optional fields may be absent or null.
    #[serde(default)]
    pub optional: bool,
}

/// A structural record type: a name and its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtoSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<DtoField>,
}

impl DtoSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(DtoField {
            name: name.into(),
            ty,
            optional: false,
        });
        self
    }

    pub fn optional_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(DtoField {
            name: name.into(),
            ty,
            optional: true,
        });
        self
    }

    /// Build a `Dto` from a raw response mapping.
    pub fn construct(&self, raw: &Value) -> Result<Dto, ValidationError> {
        let Value::Object(map) = raw else {
            return Err(self.error(None, ValidationFailure::NotAMapping { found: kind_of(raw) }));
        };

        let mut values = map.clone();
        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) if field.optional => {}
                None => {
                    return Err(self.error(Some(&field.name), ValidationFailure::Missing));
                }
                Some(value) => {
                    let coerced = field.ty.coerce(value).ok_or_else(|| {
                        self.error(
                            Some(&field.name),
                            ValidationFailure::Mismatch {
                                expected: field.ty.name(),
                                found: kind_of(value),
                            },
                        )
                    })?;
                    values.insert(field.name.clone(), coerced);
                }
            }
        }

        Ok(Dto {
            type_name: self.name.clone(),
            values,
        })
    }

    fn error(&self, field: Option<&str>, failure: ValidationFailure) -> ValidationError {
        ValidationError {
            dto: self.name.clone(),
            field: field.map(str::to_string),
            failure,
        }
    }
}

/// A validated response record.
#[derive(Debug, Clone, PartialEq)]
pub struct Dto {
    type_name: String,
    values: Params,
}

impl Dto {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Any field of the response, declared or not.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn fields(&self) -> &Params {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Decode into a concrete Rust type.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        serde_json::from_value(self.into_value()).map_err(|e| ClientError::Decode {
            target: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }
}
