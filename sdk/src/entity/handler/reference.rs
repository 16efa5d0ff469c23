use crate::entity::store::Odm;
use crate::entity::types::{EntityError, EntityResult, ID_KEY, Value};
use std::sync::Arc;
use tracing::trace;

/// Resolve a value assigned to a reference of entity type `target`.
///
/// Accepts a live instance of that type, a mapping with `_id` (updates to an
/// existing entity, applied as a merge) or a mapping without one (a new entity).
pub(super) async fn resolve(
    odm: &Arc<Odm>,
    target: &str,
    input: Value,
    path: &str,
) -> EntityResult<Value> {
    if !odm.registry().contains(target) {
        return Err(EntityError::WrongPropertyType {
            path: path.to_string(),
            type_name: target.to_string(),
        });
    }

    match input {
        Value::Model(model) => {
            if model.name() != target {
                return Err(EntityError::WrongModelType {
                    path: path.to_string(),
                    expected: target.to_string(),
                    actual: model.name().to_string(),
                });
            }
            Ok(Value::Model(model))
        }
        Value::Object(mut fields) => match fields.remove(ID_KEY) {
            Some(id) if !id.is_null() => {
                trace!(path, "updating existing '{}' with id '{}'", target, id);
                let mut child = odm.load(target, &id).await?;
                child.merge(fields).await?;
                Ok(child.into())
            }
            _ => {
                trace!(path, "creating new '{}'", target);
                let mut child = odm.create(target)?;
                child.set(fields).await?;
                Ok(child.into())
            }
        },
        other => Err(EntityError::wrong_type(path, target, &other)),
    }
}
