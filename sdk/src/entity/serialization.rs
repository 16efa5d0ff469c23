//! JSON bridge and dot-notation helpers for entity documents
//!
//! Storage receives partial updates as flat documents keyed by dot paths
//! (`{"object.b": false}`). The helpers here build those documents from an
//! entity's data and apply them back onto stored documents.

use crate::entity::types::{Document, Value};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeSet;

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => d.serialize(serializer),
            Value::ObjectId(id) => id.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => serialize_document(map, serializer),
            Value::Model(model) => serialize_document(model.data(), serializer),
        }
    }
}

fn serialize_document<S: Serializer>(doc: &Document, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(doc.len()))?;
    for (key, value) in doc {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Convert a value into JSON. Dates and identifiers become strings, live models their data.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
        Value::ObjectId(id) => serde_json::Value::String(id.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Object(map) => document_to_json(map),
        Value::Model(model) => document_to_json(model.data()),
    }
}

pub fn document_to_json(doc: &Document) -> serde_json::Value {
    serde_json::Value::Object(
        doc.iter()
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect(),
    )
}

/// Build a document from a JSON object; other JSON values give an empty document
pub fn document_from_json(json: serde_json::Value) -> Document {
    Value::from(json).into_object().unwrap_or_default()
}

/// Join a parent path and a key
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Dot paths of every leaf under `path`. Empty objects count as leaves.
pub fn leaf_paths(path: &str, value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_paths(path, value, &mut out);
    out
}

fn collect_leaf_paths(path: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaf_paths(&join_path(path, key), child, out);
            }
        }
        _ => out.push(path.to_string()),
    }
}

/// Look up a value by dot path, descending through nested objects
pub fn lookup_dotted<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Assign a value by dot path, creating or replacing intermediate objects
pub fn insert_dotted(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if entry.as_object().is_none() {
                *entry = Value::Object(Document::new());
            }
            if let Value::Object(child) = entry {
                insert_dotted(child, rest, value);
            }
        }
    }
}

/// Whether some proper ancestor of `path` is in `paths`
pub fn has_ancestor_in(path: &str, paths: &BTreeSet<String>) -> bool {
    path.match_indices('.')
        .any(|(idx, _)| paths.contains(&path[..idx]))
}

/// Build a flat dot-notation update document from the dirty paths of `data`.
///
/// A path whose ancestor is also dirty is covered by the ancestor's value.
pub fn dotted_update(data: &Document, dirty: &BTreeSet<String>) -> Document {
    let mut update = Document::new();
    for path in dirty {
        if has_ancestor_in(path, dirty) {
            continue;
        }
        if let Some(value) = lookup_dotted(data, path) {
            update.insert(path.clone(), value.clone());
        }
    }
    update
}

/// Apply a dot-notation update onto a document
pub fn apply_dotted(doc: &mut Document, update: Document) {
    for (path, value) in update {
        insert_dotted(doc, &path, value);
    }
}

/// Recursively merge plain objects from `incoming` into `target`; anything else replaces
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(update)) => {
            for (key, value) in update {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
