//! Core types for the entity framework

use crate::entity::model::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Reserved key holding a document's identifier
pub const ID_KEY: &str = "_id";

/// String-keyed mapping used for entity data, computed views and stored documents
pub type Document = BTreeMap<String, Value>;

/// Opaque document identifier.
///
/// Backed by a random UUID; the canonical string encoding is the hyphenated
/// UUID form. Identifiers are generated by storage on insert.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse the canonical string encoding
    pub fn parse_str(s: &str) -> EntityResult<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| {
            EntityError::validation(
                ID_KEY,
                "objectId",
                format!("'{}' is not a valid object id: {}", s, e),
            )
        })
    }

    /// Get the raw 16 bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Get the inner UUID
    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Timestamp type for date values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a DateTime<Utc>
    pub fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Create a Timestamp from milliseconds since Unix epoch
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Create a Timestamp representing the current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner DateTime<Utc>
    pub fn datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Parse from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self(dt.with_timezone(&Utc)))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::ops::Deref for Timestamp {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_rfc3339(&s)
            .map_err(|e| serde::de::Error::custom(format!("Invalid RFC3339 timestamp: {}", e)))
    }
}

/// A dynamic document value.
///
/// `Model` holds a live entity instance at a reference path. The enclosing
/// document owns it; dehydration replaces it with a plain stub.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(Timestamp),
    ObjectId(ObjectId),
    Array(Vec<Value>),
    Object(Document),
    Model(Box<Model>),
}

impl Value {
    /// Name of the variant, used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::ObjectId(_) => "objectId",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Model(_) => "model",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value as f64, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Document> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut Model> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Consume into a document, if this is an object
    pub fn into_object(self) -> Option<Document> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Check whether this is a reference stub: a plain mapping carrying an identifier
    pub fn is_stub(&self) -> bool {
        self.as_object()
            .and_then(|map| map.get(ID_KEY))
            .is_some_and(|id| !id.is_null())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::ObjectId(id) => write!(f, "{}", id),
            Value::Model(model) => write!(f, "<{}>", model.name()),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Value::Date(t)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Document> for Value {
    fn from(map: Document) -> Self {
        Value::Object(map)
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Model(Box::new(model))
    }
}

/// Comprehensive error type for entity operations
#[derive(Error, Debug)]
pub enum EntityError {
    /// Constraint, required or shape violation
    #[error("Validation failed at '{path}' ({constraint}): {message}")]
    Validation {
        path: String,
        constraint: String,
        message: String,
    },

    /// Input value does not have the shape the schema expects
    #[error("Expected value of '{path}' to be {expected}, got {actual}")]
    WrongType {
        path: String,
        expected: String,
        actual: String,
    },

    /// Declared property type is neither a base type nor a registered model
    #[error("Expected type of '{path}' to be one of base types or model, got '{type_name}'")]
    WrongPropertyType { path: String, type_name: String },

    /// Live model assigned to a reference of another entity type
    #[error("Expected value of '{path}' to be instance of '{expected}', got '{actual}'")]
    WrongModelType {
        path: String,
        expected: String,
        actual: String,
    },

    /// Unknown top-level property
    #[error("Property '{property}' not allowed on '{entity_type}'")]
    PropertyNotAllowed {
        entity_type: String,
        property: String,
    },

    /// Unknown key inside a nested object with declared properties
    #[error("Key '{key}' in '{path}' is not allowed")]
    KeyNotAllowed { key: String, path: String },

    #[error("Array '{path}' is too short: {len} < {min}")]
    ArrayTooShort { path: String, min: usize, len: usize },

    #[error("Array '{path}' is too long: {len} > {max}")]
    ArrayTooLong { path: String, max: usize, len: usize },

    /// Identifier already present on the instance
    #[error("Can't overwrite '_id' of '{entity_type}'")]
    CantOverwriteId { entity_type: String },

    /// Identifier value is neither an object id nor a string.
    /// Malformed string encodings are `Validation` errors instead.
    #[error("Invalid id for entity '{entity_type}': {reason}")]
    InvalidId { entity_type: String, reason: String },

    #[error("Missing '_id' on merge save of '{entity_type}'")]
    MissingIdOnMergeSave { entity_type: String },

    /// No schema registered under this name
    #[error("Unknown model '{name}'")]
    UnknownModel { name: String },

    /// Entity not found by the given ID
    #[error("Entity '{entity_type}' with id '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// Schema-related error
    #[error("Schema error for entity '{entity_type}': {reason}")]
    Schema { entity_type: String, reason: String },

    /// Storage collaborator failure, passed through unchanged
    #[error("Store operation failed for entity '{entity_type}': {operation}")]
    Storage {
        entity_type: String,
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Cache collaborator failure, passed through unchanged
    #[error("Cache invalidation failed for entity '{entity_type}'")]
    Cache {
        entity_type: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl EntityError {
    /// Create a Validation error
    pub fn validation<P: AsRef<str>, C: AsRef<str>, M: AsRef<str>>(
        path: P,
        constraint: C,
        message: M,
    ) -> Self {
        Self::Validation {
            path: path.as_ref().to_string(),
            constraint: constraint.as_ref().to_string(),
            message: message.as_ref().to_string(),
        }
    }

    /// Create a missing-required Validation error
    pub fn missing_required<P: AsRef<str>>(path: P) -> Self {
        Self::validation(path, "required", "missing required value")
    }

    /// Create a WrongType error
    pub fn wrong_type<P: AsRef<str>, E: AsRef<str>>(path: P, expected: E, actual: &Value) -> Self {
        Self::WrongType {
            path: path.as_ref().to_string(),
            expected: expected.as_ref().to_string(),
            actual: actual.type_name().to_string(),
        }
    }

    /// Create a Schema error
    pub fn schema<E: AsRef<str>, R: AsRef<str>>(entity_type: E, reason: R) -> Self {
        Self::Schema {
            entity_type: entity_type.as_ref().to_string(),
            reason: reason.as_ref().to_string(),
        }
    }

    /// Create a Storage error wrapping the collaborator failure
    pub fn storage<E: AsRef<str>, O: AsRef<str>>(
        entity_type: E,
        operation: O,
        source: anyhow::Error,
    ) -> Self {
        Self::Storage {
            entity_type: entity_type.as_ref().to_string(),
            operation: operation.as_ref().to_string(),
            source,
        }
    }

    /// Create a Cache error wrapping the collaborator failure
    pub fn cache<E: AsRef<str>>(entity_type: E, source: anyhow::Error) -> Self {
        Self::Cache {
            entity_type: entity_type.as_ref().to_string(),
            source,
        }
    }

    /// Create a Configuration error
    pub fn configuration<R: AsRef<str>>(reason: R) -> Self {
        Self::Configuration {
            reason: reason.as_ref().to_string(),
        }
    }

    /// Machine-readable kind tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::WrongType { .. } => "wrong_type",
            Self::WrongPropertyType { .. } => "wrong_property_type",
            Self::WrongModelType { .. } => "wrong_model_type",
            Self::PropertyNotAllowed { .. } => "property_not_allowed",
            Self::KeyNotAllowed { .. } => "key_not_allowed",
            Self::ArrayTooShort { .. } => "array_too_short",
            Self::ArrayTooLong { .. } => "array_too_long",
            Self::CantOverwriteId { .. } => "cant_overwrite_id",
            Self::InvalidId { .. } => "invalid_id",
            Self::MissingIdOnMergeSave { .. } => "missing_id_on_merge_save",
            Self::UnknownModel { .. } => "unknown_model",
            Self::NotFound { .. } => "not_found",
            Self::Schema { .. } => "schema",
            Self::Storage { .. } => "storage",
            Self::Cache { .. } => "cache",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Check if the caller can recover by supplying corrected input
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation { .. }
            | Self::WrongType { .. }
            | Self::WrongModelType { .. }
            | Self::PropertyNotAllowed { .. }
            | Self::KeyNotAllowed { .. }
            | Self::ArrayTooShort { .. }
            | Self::ArrayTooLong { .. }
            | Self::InvalidId { .. }
            | Self::NotFound { .. } => true,

            Self::CantOverwriteId { .. }
            | Self::MissingIdOnMergeSave { .. }
            | Self::WrongPropertyType { .. }
            | Self::UnknownModel { .. }
            | Self::Schema { .. }
            | Self::Storage { .. }
            | Self::Cache { .. }
            | Self::Configuration { .. } => false,
        }
    }
}

/// Result type alias for entity operations
pub type EntityResult<T> = Result<T, EntityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_string_roundtrip() {
        let id = ObjectId::new();
        let parsed = ObjectId::parse_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn object_id_rejects_garbage() {
        let err = ObjectId::parse_str("123456789012345678901234").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn object_ids_are_unique() {
        assert_ne!(ObjectId::new(), ObjectId::new());
    }

    #[test]
    fn stub_detection() {
        let mut stub = Document::new();
        stub.insert(ID_KEY.to_string(), Value::from(ObjectId::new()));
        assert!(Value::Object(stub).is_stub());

        let mut no_id = Document::new();
        no_id.insert("name".to_string(), Value::from("x"));
        assert!(!Value::Object(no_id).is_stub());
        assert!(!Value::from("x").is_stub());
    }

    #[test]
    fn error_kind_tags() {
        let err = EntityError::ArrayTooShort {
            path: "tags".into(),
            min: 1,
            len: 0,
        };
        assert_eq!(err.kind(), "array_too_short");
        assert!(err.to_string().contains("tags"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn timestamp_rfc3339() {
        let ts = Timestamp::from_rfc3339("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(ts.timestamp(), 1704164645);
    }
}
