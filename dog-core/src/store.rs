use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entity::{Entity, EntityId};
use crate::errors::{StoreError, StoreResult};
use crate::predicate::Predicate;

/// Persistence methods the engine may issue, in the spirit of the
/// Feathers service methods (find, get, create, update, remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    FindMany,
    FindOne,
    Create,
    Update,
    Delete,
}

impl StoreMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMethod::FindMany => "findMany",
            StoreMethod::FindOne => "findOne",
            StoreMethod::Create => "create",
            StoreMethod::Update => "update",
            StoreMethod::Delete => "delete",
        }
    }
}

/// Persistence contract consumed by the graph engine.
///
/// - `find_many` → every entity of a type matching a predicate
/// - `find_one`  → one entity by id, only if it also matches the predicate
/// - `create`    → insert one entity
/// - `update`    → merge `data` into an entity matching id + predicate
/// - `delete`    → remove an entity matching id + predicate
///
/// Absence is reported as `Ok(None)`; an id that exists but fails the
/// predicate must be indistinguishable from a missing id.
///
/// All methods have default implementations that return
/// "Method not implemented", so a read-only store can override only
/// what it actually supports.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_many(&self, _entity_type: &str, _predicate: &Predicate) -> StoreResult<Vec<Entity>> {
        Err(StoreError::NotImplemented("findMany"))
    }

    async fn find_one(
        &self,
        _entity_type: &str,
        _id: &EntityId,
        _predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        Err(StoreError::NotImplemented("findOne"))
    }

    /// Insert a new entity. An `id` key in `data` is honoured, otherwise
    /// the store assigns one.
    async fn create(&self, _entity_type: &str, _data: Map<String, Value>) -> StoreResult<Entity> {
        Err(StoreError::NotImplemented("create"))
    }

    async fn update(
        &self,
        _entity_type: &str,
        _id: &EntityId,
        _data: Map<String, Value>,
        _predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        Err(StoreError::NotImplemented("update"))
    }

    async fn delete(
        &self,
        _entity_type: &str,
        _id: &EntityId,
        _predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        Err(StoreError::NotImplemented("delete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    #[async_trait]
    impl EntityStore for Empty {
        async fn find_many(&self, _entity_type: &str, _predicate: &Predicate) -> StoreResult<Vec<Entity>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn unimplemented_methods_report_their_name() {
        let store = Empty;
        assert!(store.find_many("Post", &Predicate::Always).await.unwrap().is_empty());

        let err = store.create("Post", Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Method not implemented: create");
    }
}
