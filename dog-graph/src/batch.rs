//! Batch loader.
//!
//! A [`BatchWindow`] lives for exactly one resolution pass. While the
//! coordinator fans out over sibling entities, every relation lookup is
//! [`schedule`](BatchWindow::schedule)d into the window and gets back a
//! [`LoadHandle`]. Nothing is fetched at that point. When the fan-out is
//! done the coordinator calls [`dispatch`](BatchWindow::dispatch): each
//! relation with pending keys issues a single
//! `find_many(target, target_key IN (keys))`, and the rows are grouped
//! by key and handed to every waiter of that key.
//!
//! Keys are memoized per window: scheduling a key that is already
//! pending or loaded returns a handle to the same slot, so a key is
//! fetched at most once per pass and all its requesters share one
//! `Arc` of rows.
//!
//! IMPORTANT: the window state sits behind a sync mutex that is never
//! held across `.await`. Pending batches are taken out under the lock,
//! fetched without it, and waiters are completed through oneshot
//! channels.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dog_core::{Entity, EntityStore, KeyValue, Predicate};
use futures::future::{try_join_all, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::catalog::{Relation, RelationName};
use crate::error::{GraphError, GraphResult};

/// Rows loaded for one key.
pub type Rows = Arc<[Entity]>;

type Slot = Shared<oneshot::Receiver<Rows>>;

/// Deduplication key of a lookup within one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub relation: RelationName,
    pub key: KeyValue,
}

struct PendingBatch {
    relation: Arc<Relation>,
    waiters: BTreeMap<KeyValue, oneshot::Sender<Rows>>,
}

#[derive(Default)]
struct WindowState {
    slots: HashMap<BatchKey, Slot>,
    pending: BTreeMap<RelationName, PendingBatch>,
    fetches: usize,
    closed: bool,
}

/// Coalesces relation lookups of one resolution pass.
#[derive(Default)]
pub struct BatchWindow {
    state: Mutex<WindowState>,
}

impl BatchWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the rows of `relation` keyed by `key`.
    ///
    /// On a closed window the returned handle resolves to `Cancelled`.
    pub fn schedule(&self, relation: &Arc<Relation>, key: KeyValue) -> LoadHandle {
        let batch_key = BatchKey {
            relation: relation.name().clone(),
            key,
        };

        let mut state = self.state.lock();
        if let Some(slot) = state.slots.get(&batch_key) {
            return LoadHandle {
                key: batch_key,
                slot: slot.clone(),
            };
        }

        let (tx, rx) = oneshot::channel();
        let slot = rx.shared();
        if !state.closed {
            state
                .pending
                .entry(batch_key.relation.clone())
                .or_insert_with(|| PendingBatch {
                    relation: Arc::clone(relation),
                    waiters: BTreeMap::new(),
                })
                .waiters
                .insert(batch_key.key.clone(), tx);
        }
        state.slots.insert(batch_key.clone(), slot.clone());

        LoadHandle {
            key: batch_key,
            slot,
        }
    }

    /// Keys waiting for the next dispatch, across all relations.
    pub fn pending_keys(&self) -> usize {
        self.state
            .lock()
            .pending
            .values()
            .map(|b| b.waiters.len())
            .sum()
    }

    /// Store fetches issued by this window so far.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    /// Flush every pending batch: one store fetch per relation, run
    /// concurrently. Returns the number of fetches issued.
    ///
    /// If any fetch fails the error is returned and the waiters of the
    /// failed and unfinished batches resolve to `Cancelled`.
    pub async fn dispatch(&self, store: &dyn EntityStore) -> GraphResult<usize> {
        let batches: Vec<PendingBatch> = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(GraphError::Cancelled);
            }
            std::mem::take(&mut state.pending).into_values().collect()
        };

        if batches.is_empty() {
            return Ok(0);
        }

        let issued = batches.len();
        self.state.lock().fetches += issued;
        try_join_all(batches.into_iter().map(|batch| load_batch(store, batch))).await?;
        Ok(issued)
    }

    /// Close the window. Pending handles resolve to `Cancelled` and later
    /// schedules never reach the store.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
    }
}

async fn load_batch(store: &dyn EntityStore, batch: PendingBatch) -> GraphResult<()> {
    let PendingBatch { relation, waiters } = batch;
    let target_key = relation.target_key_field();

    let predicate = Predicate::is_in(target_key, waiters.keys().map(KeyValue::to_value));
    let rows = store.find_many(relation.target_type(), &predicate).await?;
    debug!(
        "Loaded {} rows for {} ({} keys)",
        rows.len(),
        relation.name(),
        waiters.len()
    );

    let mut grouped: HashMap<KeyValue, Vec<Entity>> = HashMap::new();
    for row in rows {
        if let Some(key) = row.key(target_key) {
            grouped.entry(key).or_default().push(row);
        }
    }

    for (key, waiter) in waiters {
        let rows = grouped.remove(&key).unwrap_or_default();
        // the receiver lives in the window's slot map; a send can only
        // fail once the window itself is gone
        let _ = waiter.send(Rows::from(rows));
    }
    Ok(())
}

/// Promise-like handle to the rows of one [`BatchKey`].
pub struct LoadHandle {
    key: BatchKey,
    slot: Slot,
}

impl LoadHandle {
    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    /// Wait for the window to deliver. Resolves once the batch holding
    /// this key has been dispatched.
    pub async fn wait(self) -> GraphResult<Rows> {
        self.slot.await.map_err(|_| GraphError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dog_core::{MemoryStore, StoreMethod};

    fn store() -> MemoryStore {
        MemoryStore::new().with_entities((1..=5).map(|i| {
            Entity::new("User", i.to_string()).with_field("name", format!("user-{i}"))
        }))
    }

    fn author() -> Arc<Relation> {
        Arc::new(Relation::belongs_to("Post", "author", "User", "authorId"))
    }

    #[tokio::test]
    async fn coalesces_sibling_lookups_into_one_fetch() {
        let store = store();
        let window = BatchWindow::new();
        let relation = author();

        // 50 siblings over 3 distinct keys
        let handles: Vec<LoadHandle> = (0..50)
            .map(|i| window.schedule(&relation, KeyValue::new(((i % 3) + 1).to_string())))
            .collect();
        assert_eq!(window.pending_keys(), 3);

        assert_eq!(window.dispatch(&store).await.unwrap(), 1);
        let calls = store.calls(StoreMethod::FindMany, "User");
        assert_eq!(calls.len(), 1);

        for (i, handle) in handles.into_iter().enumerate() {
            let expected = ((i % 3) + 1).to_string();
            let rows = handle.wait().await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id.as_str(), expected);
        }
    }

    #[tokio::test]
    async fn same_key_shares_one_result() {
        let store = store();
        let window = BatchWindow::new();
        let relation = author();

        let a = window.schedule(&relation, KeyValue::new("2"));
        let b = window.schedule(&relation, KeyValue::new("2"));
        window.dispatch(&store).await.unwrap();

        let (a, b) = (a.wait().await.unwrap(), b.wait().await.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn loaded_keys_are_not_fetched_again() {
        let store = store();
        let window = BatchWindow::new();
        let relation = author();

        window.schedule(&relation, KeyValue::new("1"));
        window.dispatch(&store).await.unwrap();

        let again = window.schedule(&relation, KeyValue::new("1"));
        assert_eq!(window.pending_keys(), 0);
        assert_eq!(window.dispatch(&store).await.unwrap(), 0);
        assert_eq!(again.wait().await.unwrap().len(), 1);
        assert_eq!(window.fetch_count(), 1);
        assert_eq!(store.journal().len(), 1);
    }

    #[tokio::test]
    async fn missing_keys_resolve_to_no_rows() {
        let store = store();
        let window = BatchWindow::new();
        let handle = window.schedule(&author(), KeyValue::new("404"));
        window.dispatch(&store).await.unwrap();
        assert!(handle.wait().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn has_many_groups_rows_by_foreign_key() {
        let store = MemoryStore::new().with_entities([
            Entity::new("Post", "1").with_field("authorId", "1"),
            Entity::new("Post", "2").with_field("authorId", "1"),
            Entity::new("Post", "3").with_field("authorId", "2"),
        ]);
        let posts = Arc::new(Relation::has_many("User", "posts", "Post", "authorId"));
        let window = BatchWindow::new();

        let first = window.schedule(&posts, KeyValue::new("1"));
        let second = window.schedule(&posts, KeyValue::new("2"));
        let third = window.schedule(&posts, KeyValue::new("3"));
        window.dispatch(&store).await.unwrap();

        assert_eq!(first.wait().await.unwrap().len(), 2);
        assert_eq!(second.wait().await.unwrap().len(), 1);
        assert!(third.wait().await.unwrap().is_empty());
        assert_eq!(store.journal().len(), 1);
    }

    #[tokio::test]
    async fn closing_cancels_pending_handles() {
        let store = store();
        let window = BatchWindow::new();
        let relation = author();

        let pending = window.schedule(&relation, KeyValue::new("1"));
        window.close();
        assert!(matches!(pending.wait().await, Err(GraphError::Cancelled)));

        let late = window.schedule(&relation, KeyValue::new("2"));
        assert!(matches!(late.wait().await, Err(GraphError::Cancelled)));
        assert!(matches!(window.dispatch(&store).await, Err(GraphError::Cancelled)));
        assert!(store.journal().is_empty());
    }
}
