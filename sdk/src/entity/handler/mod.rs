//! Value dispatch against property descriptors
//!
//! `resolve` validates an assigned value and produces what gets stored plus the
//! dot paths it touched. `read` produces the computed view of a stored value.

mod array;
mod object;
pub mod primitive;
mod reference;

use crate::entity::schema::{Primitive, PropertyDescriptor, PropertyType, SchemaRegistry};
use crate::entity::serialization::{join_path, leaf_paths};
use crate::entity::store::Odm;
use crate::entity::types::{Document, EntityError, EntityResult, Value};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::trace;

/// Outcome of resolving one assigned value
#[derive(Debug)]
pub struct Resolved {
    pub value: Value,
    /// Dot paths written by this assignment, for partial updates
    pub dirty: Vec<String>,
}

impl Resolved {
    fn at(path: String, value: Value) -> Self {
        Self {
            value,
            dirty: vec![path],
        }
    }
}

/// Resolve an assigned value against its descriptor.
///
/// Nested objects, array items and references are resolved concurrently;
/// `depth` only feeds diagnostics.
pub fn resolve<'a>(
    odm: &'a Arc<Odm>,
    descriptor: &'a PropertyDescriptor,
    input: Value,
    path: String,
    depth: usize,
) -> BoxFuture<'a, EntityResult<Resolved>> {
    async move {
        trace!(
            path = %path,
            depth,
            "resolving {} as {}",
            input.type_name(),
            descriptor.kind.type_name()
        );

        match &descriptor.kind {
            PropertyType::Primitive(Primitive::Mixed) => {
                let value = primitive::set(Primitive::Mixed, descriptor, input, &path)?;
                let dirty = leaf_paths(&path, &value);
                Ok(Resolved { value, dirty })
            }
            PropertyType::Primitive(kind) => {
                let value = primitive::set(*kind, descriptor, input, &path)?;
                Ok(Resolved::at(path, value))
            }
            PropertyType::Object(properties) => {
                object::resolve(odm, descriptor, properties, input, path, depth).await
            }
            PropertyType::Array(item) => array::resolve(odm, descriptor, item, input, path, depth).await,
            PropertyType::Reference(target) => {
                let value = reference::resolve(odm, target, input, &path).await?;
                Ok(Resolved::at(path, value))
            }
        }
    }
    .boxed()
}

/// Check a value stored without a schema below `path`.
///
/// Keys must not contain dots, since their leaf paths feed dot-notation
/// updates. Live models are rejected: nothing would save or stub them.
pub(crate) fn check_untyped(path: &str, value: &Value) -> EntityResult<()> {
    match value {
        Value::Model(_) => Err(EntityError::wrong_type(path, "Mixed", value)),
        Value::Object(map) => {
            for (key, child) in map {
                if key.contains('.') {
                    return Err(EntityError::KeyNotAllowed {
                        key: key.clone(),
                        path: path.to_string(),
                    });
                }
                check_untyped(&join_path(path, key), child)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_untyped(&format!("{}.{}", path, i), item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Computed view of a stored value; `None` omits it from the view
pub fn read(
    registry: &SchemaRegistry,
    descriptor: &PropertyDescriptor,
    raw: Option<&Value>,
    path: &str,
) -> EntityResult<Option<Value>> {
    let raw = match raw {
        Some(value) if !value.is_null() => value,
        _ => {
            if let Some(default) = &descriptor.default {
                return Ok(Some(default.clone()));
            }
            if descriptor.required {
                return Err(EntityError::missing_required(path));
            }
            return Ok(None);
        }
    };

    let value = match &descriptor.kind {
        PropertyType::Primitive(kind) => primitive::get(*kind, raw),
        PropertyType::Object(properties) if !properties.is_empty() => match raw.as_object() {
            Some(map) => {
                let mut view = Document::new();
                for property in properties {
                    let child_path = join_path(path, &property.name);
                    if let Some(value) =
                        read(registry, &property.descriptor, map.get(&property.name), &child_path)?
                    {
                        view.insert(property.name.clone(), value);
                    }
                }
                Value::Object(view)
            }
            None => raw.clone(),
        },
        PropertyType::Object(_) => raw.clone(),
        PropertyType::Array(item) if !item.kind.is_mixed() => match raw.as_array() {
            Some(items) => {
                let mut view = Vec::with_capacity(items.len());
                for (i, element) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    view.push(read(registry, item, Some(element), &item_path)?.unwrap_or(Value::Null));
                }
                Value::Array(view)
            }
            None => raw.clone(),
        },
        PropertyType::Array(_) => raw.clone(),
        PropertyType::Reference(target) => {
            if !registry.contains(target) {
                return Err(EntityError::WrongPropertyType {
                    path: path.to_string(),
                    type_name: target.clone(),
                });
            }
            raw.clone()
        }
    };

    Ok(Some(value))
}
