use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::entity::{Entity, EntityId, KeyValue, ID_FIELD};
use crate::errors::{StoreError, StoreResult};
use crate::predicate::Predicate;
use crate::store::{EntityStore, StoreMethod};

// entity_type -> id -> entity
type Tables = HashMap<String, BTreeMap<EntityId, Entity>>;

/// One call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub method: StoreMethod,
    pub entity_type: String,
    pub id: Option<EntityId>,
    pub predicate: Predicate,
}

/// In-memory store for testing and development.
///
/// Every call through [`EntityStore`] is appended to a journal so tests
/// can assert exactly which fetches a resolution pass issued. Seeding
/// with [`MemoryStore::insert`] bypasses the journal.
#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    journal: Arc<Mutex<Vec<StoreCall>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity, replacing any previous one with the same id.
    pub fn insert(&self, entity: Entity) {
        self.tables
            .write()
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.id.clone(), entity);
    }

    pub fn with_entities<I>(self, entities: I) -> Self
    where
        I: IntoIterator<Item = Entity>,
    {
        for entity in entities {
            self.insert(entity);
        }
        self
    }

    /// Snapshot of every call issued so far.
    pub fn journal(&self) -> Vec<StoreCall> {
        self.journal.lock().clone()
    }

    /// Calls of `method` against `entity_type`.
    pub fn calls(&self, method: StoreMethod, entity_type: &str) -> Vec<StoreCall> {
        self.journal
            .lock()
            .iter()
            .filter(|c| c.method == method && c.entity_type == entity_type)
            .cloned()
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    pub fn len(&self, entity_type: &str) -> usize {
        self.tables.read().get(entity_type).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, entity_type: &str) -> bool {
        self.len(entity_type) == 0
    }

    fn record(&self, method: StoreMethod, entity_type: &str, id: Option<&EntityId>, predicate: &Predicate) {
        debug!("MemoryStore {} on {}", method.as_str(), entity_type);
        self.journal.lock().push(StoreCall {
            method,
            entity_type: entity_type.to_string(),
            id: id.cloned(),
            predicate: predicate.clone(),
        });
    }
}

fn take_id(entity_type: &str, data: &mut Map<String, Value>) -> StoreResult<Option<EntityId>> {
    match data.remove(ID_FIELD) {
        None => Ok(None),
        Some(v) => KeyValue::from_value(&v)
            .map(|k| Some(EntityId::new(k.as_str())))
            .ok_or_else(|| StoreError::InvalidData {
                entity_type: entity_type.to_string(),
                reason: "id must be a scalar".to_string(),
            }),
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_many(&self, entity_type: &str, predicate: &Predicate) -> StoreResult<Vec<Entity>> {
        self.record(StoreMethod::FindMany, entity_type, None, predicate);
        let tables = self.tables.read();
        Ok(tables
            .get(entity_type)
            .map(|rows| {
                rows.values()
                    .filter(|e| predicate.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        entity_type: &str,
        id: &EntityId,
        predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        self.record(StoreMethod::FindOne, entity_type, Some(id), predicate);
        let tables = self.tables.read();
        Ok(tables
            .get(entity_type)
            .and_then(|rows| rows.get(id))
            .filter(|e| predicate.matches(e))
            .cloned())
    }

    async fn create(&self, entity_type: &str, mut data: Map<String, Value>) -> StoreResult<Entity> {
        self.record(StoreMethod::Create, entity_type, None, &Predicate::Always);
        let id = take_id(entity_type, &mut data)?
            .unwrap_or_else(|| EntityId::new(Uuid::new_v4().to_string()));
        data.remove("__typename");

        let mut tables = self.tables.write();
        let rows = tables.entry(entity_type.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(StoreError::Conflict {
                entity_type: entity_type.to_string(),
                id: id.to_string(),
            });
        }

        let entity = Entity {
            entity_type: entity_type.to_string(),
            id: id.clone(),
            fields: data,
        };
        rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(
        &self,
        entity_type: &str,
        id: &EntityId,
        data: Map<String, Value>,
        predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        self.record(StoreMethod::Update, entity_type, Some(id), predicate);
        if data.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidData {
                entity_type: entity_type.to_string(),
                reason: "id is not writable".to_string(),
            });
        }

        let mut tables = self.tables.write();
        let Some(entity) = tables
            .get_mut(entity_type)
            .and_then(|rows| rows.get_mut(id))
            .filter(|e| predicate.matches(e))
        else {
            return Ok(None);
        };

        entity.fields.extend(data);
        Ok(Some(entity.clone()))
    }

    async fn delete(
        &self,
        entity_type: &str,
        id: &EntityId,
        predicate: &Predicate,
    ) -> StoreResult<Option<Entity>> {
        self.record(StoreMethod::Delete, entity_type, Some(id), predicate);
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(entity_type) else {
            return Ok(None);
        };
        if !rows.get(id).is_some_and(|e| predicate.matches(e)) {
            return Ok(None);
        }
        Ok(rows.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_entities([
            Entity::new("Post", "1").with_field("ownerId", "7"),
            Entity::new("Post", "2").with_field("ownerId", "9"),
        ])
    }

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn find_one_hides_rows_failing_the_predicate() {
        let store = seeded();
        let mine = Predicate::eq("ownerId", "7");

        assert!(store.find_one("Post", &"1".into(), &mine).await.unwrap().is_some());
        assert!(store.find_one("Post", &"2".into(), &mine).await.unwrap().is_none());
        assert!(store.find_one("Post", &"3".into(), &mine).await.unwrap().is_none());
        assert_eq!(store.calls(StoreMethod::FindOne, "Post").len(), 3);
    }

    #[tokio::test]
    async fn create_assigns_ids_and_rejects_duplicates() {
        let store = seeded();
        let created = store.create("Post", data(json!({"title": "new"}))).await.unwrap();
        assert!(!created.id.as_str().is_empty());
        assert_eq!(store.len("Post"), 3);

        let err = store.create("Post", data(json!({"id": "1"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_and_delete_respect_the_predicate() {
        let store = seeded();
        let mine = Predicate::eq("ownerId", "7");

        let updated = store
            .update("Post", &"1".into(), data(json!({"title": "edited"})), &mine)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["title"], json!("edited"));

        let untouched = store
            .update("Post", &"2".into(), data(json!({"title": "x"})), &mine)
            .await
            .unwrap();
        assert!(untouched.is_none());

        assert!(store.delete("Post", &"2".into(), &mine).await.unwrap().is_none());
        assert!(store.delete("Post", &"1".into(), &mine).await.unwrap().is_some());
        assert_eq!(store.len("Post"), 1);
    }

    #[tokio::test]
    async fn seeding_is_not_journaled() {
        let store = seeded();
        assert!(store.journal().is_empty());
        store.find_many("Post", &Predicate::Always).await.unwrap();
        assert_eq!(store.journal().len(), 1);
        store.clear_journal();
        assert!(store.journal().is_empty());
    }
}
