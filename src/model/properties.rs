//! Free-form datacenter properties
//!
//! Values are shallow: a string, a number, a boolean or a list of strings.
//! Anything deeper is rejected when the bag enters the system.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

pub const INVALID_PROPERTIES_MESSAGE: &str =
    "properties values must be a string, number, boolean, or an array of strings";

pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<String>),
}

impl TryFrom<Value> for PropertyValue {
    type Error = RegistryError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(PropertyValue::Bool(b)),
            Value::Number(n) => Ok(PropertyValue::Number(n)),
            Value::String(s) => Ok(PropertyValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(RegistryError::invalid_argument(INVALID_PROPERTIES_MESSAGE)),
                })
                .collect::<Result<Vec<_>>>()
                .map(PropertyValue::List),
            Value::Null | Value::Object(_) => {
                Err(RegistryError::invalid_argument(INVALID_PROPERTIES_MESSAGE))
            }
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Number(n) => Value::Number(n),
            PropertyValue::Text(s) => Value::String(s),
            PropertyValue::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
        }
    }
}

/// Validate a raw JSON property bag into typed properties.
pub fn parse_properties(raw: Map<String, Value>) -> Result<Properties> {
    raw.into_iter()
        .map(|(key, value)| PropertyValue::try_from(value).map(|v| (key, v)))
        .collect()
}
