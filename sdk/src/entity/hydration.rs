//! Hydration and dehydration of reference paths
//!
//! A reference path holds either a stub (a plain mapping with `_id` and the
//! embedded fields) or a live entity. Hydration loads the entity behind each
//! stub; dehydration turns live entities back into stubs.

use crate::entity::model::Model;
use crate::entity::schema::Dependency;
use crate::entity::types::{Document, EntityError, EntityResult, ID_KEY, Value};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::collections::BTreeMap;
use tracing::debug;

/// A value sitting at a reference path
pub(crate) struct Slot<'a, 'd> {
    pub value: &'a mut Value,
    pub dependency: &'d Dependency,
}

#[derive(Clone, Copy)]
struct Pending<'d> {
    rest: &'d [String],
    dependency: &'d Dependency,
}

/// Every value at the given reference paths, descending through arrays.
///
/// The returned slots borrow disjoint parts of `data`, so they can be
/// processed concurrently.
pub(crate) fn slots<'a, 'd>(
    data: &'a mut Document,
    dependencies: impl Iterator<Item = &'d Dependency>,
) -> Vec<Slot<'a, 'd>> {
    let pending: Vec<Pending<'d>> = dependencies
        .map(|dependency| Pending {
            rest: &dependency.segments,
            dependency,
        })
        .collect();
    let mut out = Vec::new();
    collect_from_document(data, &pending, &mut out);
    out
}

fn collect_from_document<'a, 'd>(
    map: &'a mut Document,
    pending: &[Pending<'d>],
    out: &mut Vec<Slot<'a, 'd>>,
) {
    let mut groups: BTreeMap<&str, Vec<Pending<'d>>> = BTreeMap::new();
    for p in pending {
        if let Some((head, rest)) = p.rest.split_first() {
            groups.entry(head.as_str()).or_default().push(Pending {
                rest,
                dependency: p.dependency,
            });
        }
    }

    for (key, child) in map.iter_mut() {
        if let Some(group) = groups.get(key.as_str()) {
            collect_slots(child, group, out);
        }
    }
}

fn collect_slots<'a, 'd>(value: &'a mut Value, pending: &[Pending<'d>], out: &mut Vec<Slot<'a, 'd>>) {
    if !matches!(value, Value::Array(_)) {
        if let Some(terminal) = pending.iter().find(|p| p.rest.is_empty()) {
            out.push(Slot {
                value,
                dependency: terminal.dependency,
            });
            return;
        }
    }

    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                collect_slots(item, pending, out);
            }
        }
        Value::Object(map) => collect_from_document(map, pending, out),
        _ => {}
    }
}

impl Model {
    /// Replace stubs at the named reference paths (all when `None`) with live entities.
    ///
    /// Paths hydrated earlier are skipped; unknown names are ignored.
    pub async fn hydrate(&mut self, names: Option<Vec<String>>) -> EntityResult<&mut Self> {
        self.hydrate_at(names, 0).await?;
        Ok(self)
    }

    pub(crate) fn hydrate_at(
        &mut self,
        names: Option<Vec<String>>,
        depth: usize,
    ) -> BoxFuture<'_, EntityResult<()>> {
        async move {
            let schema = self.schema().clone();
            let odm = self.odm().clone();

            let requested: Vec<&Dependency> = schema
                .dependencies
                .iter()
                .filter(|d| names.as_ref().is_none_or(|names| names.contains(&d.path)))
                .collect();
            let todo: Vec<&Dependency> = requested
                .iter()
                .copied()
                .filter(|d| !self.hydrated.contains(&d.path))
                .collect();

            if !todo.is_empty() {
                let max_depth = odm.config().max_hydration_depth;
                let odm = &odm;
                let names = &names;
                let loads = slots(&mut self.data, todo.into_iter())
                    .into_iter()
                    .filter(|slot| slot.value.is_stub())
                    .map(|slot| async move {
                        let id = match slot.value.as_object().and_then(|m| m.get(ID_KEY)) {
                            Some(id) => id.clone(),
                            None => return Ok(()),
                        };
                        let target = &slot.dependency.target;
                        debug!(
                            "Hydrating '{}' at '{}' with id '{}' (depth {})",
                            target, slot.dependency.path, id, depth
                        );
                        let mut child = odm.load(target, &id).await?;
                        if depth + 1 < max_depth {
                            child.hydrate_at(names.clone(), depth + 1).await?;
                        }
                        *slot.value = child.into();
                        Ok::<_, EntityError>(())
                    });
                try_join_all(loads).await?;
            }

            for dependency in requested {
                self.hydrated.insert(dependency.path.clone());
            }
            Ok(())
        }
        .boxed()
    }

    /// Replace every live entity at a reference path with its stub
    pub fn dehydrate(&mut self) -> EntityResult<&mut Self> {
        let schema = self.schema().clone();
        for slot in slots(&mut self.data, schema.dependencies.iter()) {
            let stub = match &*slot.value {
                Value::Model(child) => child.stub(&slot.dependency.embed)?,
                _ => continue,
            };
            *slot.value = Value::Object(stub);
        }
        self.hydrated.clear();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::serialization::document_from_json;
    use serde_json::json;

    fn dep(path: &str) -> Dependency {
        Dependency::new(path.to_string(), "User".to_string(), Vec::new())
    }

    #[test]
    fn finds_slots_through_arrays_and_objects() {
        let mut data = document_from_json(json!({
            "author": {"_id": "a"},
            "readers": [{"_id": "r1"}, {"_id": "r2"}],
            "meta": {"editors": [{"who": {"_id": "e1"}, "note": 1}, {"note": 2}]},
            "title": "t"
        }));
        let deps = vec![dep("author"), dep("readers"), dep("meta.editors.who")];
        let found: Vec<(String, Value)> = slots(&mut data, deps.iter())
            .into_iter()
            .map(|s| (s.dependency.path.clone(), s.value.clone()))
            .collect();

        let paths: Vec<&str> = found.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["author", "meta.editors.who", "readers", "readers"]);
        assert!(found.iter().all(|(_, v)| v.is_stub()));
    }

    #[test]
    fn slots_allow_in_place_replacement() {
        let mut data = document_from_json(json!({"readers": [{"_id": "r1"}, {"_id": "r2"}]}));
        let deps = vec![dep("readers")];
        for slot in slots(&mut data, deps.iter()) {
            *slot.value = Value::from("replaced");
        }
        assert_eq!(
            data.get("readers"),
            Some(&Value::Array(vec!["replaced".into(), "replaced".into()]))
        );
    }

    #[test]
    fn missing_paths_yield_nothing() {
        let mut data = document_from_json(json!({"title": "t"}));
        let deps = vec![dep("author")];
        assert!(slots(&mut data, deps.iter()).is_empty());
    }
}
