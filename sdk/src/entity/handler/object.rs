use super::{Resolved, check_untyped, resolve as resolve_value};
use crate::entity::schema::{Property, PropertyDescriptor};
use crate::entity::serialization::{join_path, leaf_paths};
use crate::entity::store::Odm;
use crate::entity::types::{Document, EntityError, EntityResult, Value};
use futures::future::try_join_all;
use std::sync::Arc;

/// Resolve an object-typed property.
///
/// Without declared properties the mapping is kept as given. Otherwise every
/// key must be declared and is resolved against its own descriptor.
pub(super) async fn resolve(
    odm: &Arc<Odm>,
    descriptor: &PropertyDescriptor,
    properties: &[Property],
    input: Value,
    path: String,
    depth: usize,
) -> EntityResult<Resolved> {
    let map = match input {
        Value::Object(map) => map,
        other => return Err(EntityError::wrong_type(&path, descriptor.kind.type_name(), &other)),
    };

    if properties.is_empty() {
        let value = Value::Object(map);
        check_untyped(&path, &value)?;
        let dirty = leaf_paths(&path, &value);
        return Ok(Resolved { value, dirty });
    }

    let mut fields = Vec::with_capacity(map.len());
    for (key, value) in map {
        let child = descriptor
            .property(&key)
            .ok_or_else(|| EntityError::KeyNotAllowed {
                key: key.clone(),
                path: path.clone(),
            })?;
        let child_path = join_path(&path, &key);
        fields.push(async move {
            let resolved = resolve_value(odm, child, value, child_path, depth + 1).await?;
            Ok::<_, EntityError>((key, resolved))
        });
    }

    let mut object = Document::new();
    let mut dirty = Vec::new();
    for (key, resolved) in try_join_all(fields).await? {
        object.insert(key, resolved.value);
        dirty.extend(resolved.dirty);
    }

    Ok(Resolved {
        value: Value::Object(object),
        dirty,
    })
}
