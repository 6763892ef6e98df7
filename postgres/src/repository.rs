use crate::{database_error, sql};
use nomadhub_core::repository::{OwnerFilter, PersistenceError, RepoFuture, Repository};
use nomadhub_core::resource::{Resource, Row as ResourceRow, ID_FIELD};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::marker::PhantomData;
use std::time::Instant;

/// Repository for `R` backed by the table [`Resource::TABLE`].
pub struct PgRepository<R> {
    pool: PgPool,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for PgRepository<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> PgRepository<R> {
    /// Repository using `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _resource: PhantomData,
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn observe(operation: &'static str, table: &'static str, started: Instant) {
    metrics::histogram!(
        "repository.query.duration_seconds",
        "table" => table,
        "operation" => operation
    )
    .record(started.elapsed().as_secs_f64());
}

fn failed<R: Resource>(operation: &'static str, error: &sqlx::Error) -> PersistenceError {
    tracing::error!(table = R::TABLE, operation, %error, "Query failed");
    metrics::counter!("repository.errors", "table" => R::TABLE, "operation" => operation).increment(1);
    database_error(error)
}

fn decode_json<T: serde::de::DeserializeOwned>(resource: &'static str, value: Value) -> Result<T, PersistenceError> {
    serde_json::from_value(value).map_err(|error| PersistenceError::Decode {
        resource,
        reason: error.to_string(),
    })
}

fn decode_record<R: Resource>(row: &PgRow) -> Result<R, PersistenceError> {
    let value: Value = row.try_get("record").map_err(|error| PersistenceError::Decode {
        resource: R::TABLE,
        reason: error.to_string(),
    })?;
    decode_json(R::TABLE, value)
}

fn decode_row<R: Resource>(row: &PgRow) -> Result<ResourceRow<R>, PersistenceError> {
    let record = decode_record::<R>(row)?;
    let parent: Option<Value> = row.try_get("parent").map_err(|error| PersistenceError::Decode {
        resource: R::TABLE,
        reason: error.to_string(),
    })?;
    let parent = match parent {
        Some(Value::Null) | None => None,
        Some(value) => Some(decode_json::<R::Parent>(R::TABLE, value)?),
    };
    Ok(ResourceRow::with_parent(record, parent))
}

/// JSON form of `record` with `id` and, when given, the owner column set.
fn payload<R: Resource>(record: &R, id: Option<String>, owner: Option<&OwnerFilter>) -> Result<Value, PersistenceError> {
    let mut value = serde_json::to_value(record).map_err(|error| PersistenceError::Decode {
        resource: R::TABLE,
        reason: error.to_string(),
    })?;
    if let Some(object) = value.as_object_mut() {
        if let Some(id) = id {
            object.insert(ID_FIELD.to_string(), Value::String(id));
        }
        if let Some(filter) = owner {
            object.insert(filter.column.to_string(), Value::String(filter.user_id.clone()));
        }
    }
    Ok(value)
}

impl<R: Resource> Repository<R> for PgRepository<R> {
    fn list(&self, owner: Option<OwnerFilter>) -> RepoFuture<'_, Vec<ResourceRow<R>>> {
        Box::pin(async move {
            let started = Instant::now();
            let statement = sql::select_all::<R>(owner.as_ref());
            let mut query = sqlx::query(&statement);
            if let Some(filter) = &owner {
                query = query.bind(filter.user_id.clone());
            }
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| failed::<R>("list", &e))?;
            observe("list", R::TABLE, started);

            rows.iter().map(decode_row::<R>).collect()
        })
    }

    fn find(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<ResourceRow<R>>> {
        Box::pin(async move {
            let started = Instant::now();
            let statement = sql::select_one::<R>(owner.as_ref());
            let mut query = sqlx::query(&statement).bind(id);
            if let Some(filter) = &owner {
                query = query.bind(filter.user_id.clone());
            }
            let row = query
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| failed::<R>("find", &e))?;
            observe("find", R::TABLE, started);

            row.as_ref().map(decode_row::<R>).transpose()
        })
    }

    fn insert(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, R> {
        Box::pin(async move {
            let started = Instant::now();
            let id = uuid::Uuid::new_v4().to_string();
            let value = payload(&record, Some(id.clone()), owner.as_ref())?;

            let statement = sql::insert::<R>(owner.as_ref());
            let row = sqlx::query(&statement)
                .bind(value)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| failed::<R>("insert", &e))?;
            observe("insert", R::TABLE, started);

            tracing::debug!(table = R::TABLE, %id, "Inserted row");
            decode_record(&row)
        })
    }

    fn update(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>> {
        Box::pin(async move {
            let started = Instant::now();
            let id = record.id().to_string();
            let value = payload(&record, None, None)?;

            let statement = sql::update::<R>(owner.as_ref());
            let mut query = sqlx::query(&statement).bind(value).bind(id);
            if let Some(filter) = &owner {
                query = query.bind(filter.user_id.clone());
            }
            let row = query
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| failed::<R>("update", &e))?;
            observe("update", R::TABLE, started);

            row.as_ref().map(decode_record::<R>).transpose()
        })
    }

    fn delete(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>> {
        Box::pin(async move {
            let started = Instant::now();
            let statement = sql::delete::<R>(owner.as_ref());
            let mut query = sqlx::query(&statement).bind(id);
            if let Some(filter) = &owner {
                query = query.bind(filter.user_id.clone());
            }
            let row = query
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| failed::<R>("delete", &e))?;
            observe("delete", R::TABLE, started);

            row.as_ref().map(decode_record::<R>).transpose()
        })
    }
}
