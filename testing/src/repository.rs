//! In-memory [`Repository`] with spy counters.
//!
//! Behaves like the Postgres repository for scoping: owned rows are only
//! visible to their owner, inserts get a fresh UUID and the caller's id in
//! the owner column, and updates never touch server-managed columns.
//! Parents for the join are matched on `<foreign_key> == parent.id`.

use nomadhub_core::repository::{OwnerFilter, PersistenceError, RepoFuture, Repository};
use nomadhub_core::resource::{Resource, Row, ID_FIELD};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Vec-backed repository for tests.
pub struct InMemoryRepository<R: Resource> {
    rows: Mutex<Vec<R>>,
    parents: Vec<R::Parent>,
    failure: Mutex<Option<PersistenceError>>,
    lists: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl<R: Resource> Default for InMemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> InMemoryRepository<R> {
    /// Empty repository.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            parents: Vec::new(),
            failure: Mutex::new(None),
            lists: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Repository pre-populated with `rows`, stored as given.
    #[must_use]
    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::new()
        }
    }

    /// Parents available to the join.
    #[must_use]
    pub fn with_parents(mut self, parents: Vec<R::Parent>) -> Self {
        self.parents = parents;
        self
    }

    /// Add a row as-is, bypassing the spy counters.
    pub fn seed(&self, row: R) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(row);
        }
    }

    /// Snapshot of every stored row, regardless of owner.
    #[must_use]
    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Make every subsequent call fail with `error`.
    pub fn fail_with(&self, error: PersistenceError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    /// Number of `list` calls.
    #[must_use]
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Number of `insert` calls.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Number of `update` calls.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Inserts, updates and deletes combined.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.insert_count() + self.update_count() + self.delete_count()
    }

    fn check_failure(&self) -> Result<(), PersistenceError> {
        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Err(poisoned()),
        }
    }

    fn lock_rows(&self) -> Result<MutexGuard<'_, Vec<R>>, PersistenceError> {
        self.check_failure()?;
        self.rows.lock().map_err(|_| poisoned())
    }

    fn parent_of(&self, record: &R) -> Option<R::Parent> {
        let join = R::JOIN?;
        let key = serde_json::to_value(record).ok()?.get(join.foreign_key)?.clone();
        self.parents
            .iter()
            .find(|parent| {
                serde_json::to_value(parent)
                    .ok()
                    .and_then(|value| value.get(ID_FIELD).cloned())
                    .is_some_and(|id| id == key)
            })
            .cloned()
    }

    fn row(&self, record: R) -> Row<R> {
        let parent = self.parent_of(&record);
        Row::with_parent(record, parent)
    }
}

fn poisoned() -> PersistenceError {
    PersistenceError::Database("in-memory store poisoned".to_string())
}

fn visible<R: Resource>(record: &R, owner: Option<&OwnerFilter>) -> bool {
    owner.is_none_or(|filter| record.owner() == Some(filter.user_id.as_str()))
}

fn decode<R: Resource>(value: Value) -> Result<R, PersistenceError> {
    serde_json::from_value(value).map_err(|error| PersistenceError::Decode {
        resource: R::TABLE,
        reason: error.to_string(),
    })
}

fn encode<R: Resource>(record: &R) -> Result<Value, PersistenceError> {
    serde_json::to_value(record).map_err(|error| PersistenceError::Decode {
        resource: R::TABLE,
        reason: error.to_string(),
    })
}

impl<R: Resource> Repository<R> for InMemoryRepository<R> {
    fn list(&self, owner: Option<OwnerFilter>) -> RepoFuture<'_, Vec<Row<R>>> {
        Box::pin(async move {
            self.lists.fetch_add(1, Ordering::SeqCst);
            let visible_rows: Vec<R> = self
                .lock_rows()?
                .iter()
                .filter(|record| visible(*record, owner.as_ref()))
                .cloned()
                .collect();
            Ok(visible_rows.into_iter().map(|record| self.row(record)).collect())
        })
    }

    fn find(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<Row<R>>> {
        Box::pin(async move {
            let found = self
                .lock_rows()?
                .iter()
                .find(|record| record.id() == id && visible(*record, owner.as_ref()))
                .cloned();
            Ok(found.map(|record| self.row(record)))
        })
    }

    fn insert(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, R> {
        Box::pin(async move {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.lock_rows()?;

            let mut value = encode(&record)?;
            if let Some(object) = value.as_object_mut() {
                object.insert(ID_FIELD.to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
                if let Some(filter) = &owner {
                    object.insert(filter.column.to_string(), Value::String(filter.user_id.clone()));
                }
            }
            let stored: R = decode(value)?;
            rows.push(stored.clone());
            Ok(stored)
        })
    }

    fn update(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>> {
        Box::pin(async move {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.lock_rows()?;

            let Some(existing) = rows
                .iter_mut()
                .find(|row| row.id() == record.id() && visible(&**row, owner.as_ref()))
            else {
                return Ok(None);
            };

            let mut merged = encode(&*existing)?;
            if let (Some(target), Value::Object(incoming)) = (merged.as_object_mut(), encode(&record)?) {
                for (key, value) in incoming {
                    if !R::GENERATED.contains(&key.as_str()) {
                        target.insert(key, value);
                    }
                }
            }
            let updated: R = decode(merged)?;
            *existing = updated.clone();
            Ok(Some(updated))
        })
    }

    fn delete(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>> {
        Box::pin(async move {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.lock_rows()?;

            let position = rows
                .iter()
                .position(|record| record.id() == id && visible(record, owner.as_ref()));
            Ok(position.map(|index| rows.remove(index)))
        })
    }
}
