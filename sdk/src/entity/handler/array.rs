use super::{Resolved, check_untyped, resolve as resolve_value};
use crate::entity::schema::PropertyDescriptor;
use crate::entity::store::Odm;
use crate::entity::types::{EntityError, EntityResult, Value};
use futures::future::try_join_all;
use std::sync::Arc;

/// Resolve an array-typed property.
///
/// Arrays are always assigned whole, so the only dirty path is the array's own.
pub(super) async fn resolve(
    odm: &Arc<Odm>,
    descriptor: &PropertyDescriptor,
    item: &PropertyDescriptor,
    input: Value,
    path: String,
    depth: usize,
) -> EntityResult<Resolved> {
    let items = match input {
        Value::Array(items) => items,
        other => return Err(EntityError::wrong_type(&path, "array", &other)),
    };

    let len = items.len();
    if let Some(min) = descriptor.min {
        if (len as f64) < min {
            return Err(EntityError::ArrayTooShort {
                path,
                min: min as usize,
                len,
            });
        }
    }
    if let Some(max) = descriptor.max {
        if (len as f64) > max {
            return Err(EntityError::ArrayTooLong {
                path,
                max: max as usize,
                len,
            });
        }
    }
    if let Some(length) = descriptor.length {
        if len != length {
            return Err(EntityError::validation(
                &path,
                "length",
                format!("array length {} is not {}", len, length),
            ));
        }
    }

    if item.kind.is_mixed() {
        let value = Value::Array(items);
        check_untyped(&path, &value)?;
        return Ok(Resolved::at(path, value));
    }

    let resolved = try_join_all(items.into_iter().enumerate().map(|(i, element)| {
        resolve_value(odm, item, element, format!("{}.{}", path, i), depth + 1)
    }))
    .await?;

    Ok(Resolved::at(
        path,
        Value::Array(resolved.into_iter().map(|r| r.value).collect()),
    ))
}
