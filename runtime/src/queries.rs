//! Owner-scoped reads.
//!
//! Every read requires a principal. Owned resources are filtered to the
//! principal's rows; shared resources are returned in full. Rows belonging to
//! someone else are indistinguishable from rows that do not exist.

use nomadhub_core::context::{RequestContext, Unauthorized};
use nomadhub_core::optimistic::is_sentinel;
use nomadhub_core::repository::{OwnerFilter, PersistenceError, Repository};
use nomadhub_core::resource::{Resource, Row};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

/// Failure of a read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No principal on the request
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    /// The store failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a list read, rendered as `{ "<plural>": [...] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<R: Resource> {
    rows: Vec<Row<R>>,
}

impl<R: Resource> Listing<R> {
    /// Listing of `rows`.
    #[must_use]
    pub const fn new(rows: Vec<Row<R>>) -> Self {
        Self { rows }
    }

    /// The rows, in store order.
    #[must_use]
    pub fn rows(&self) -> &[Row<R>] {
        &self.rows
    }

    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The bare records, without parents.
    #[must_use]
    pub fn into_records(self) -> Vec<R> {
        self.rows.into_iter().map(|row| row.record).collect()
    }
}

impl<R: Resource> Serialize for Listing<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(R::PLURAL, &self.rows)?;
        map.end()
    }
}

/// Result of a by-id read, rendered as `{ "<singular>": {...} }` or `{}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<R: Resource> {
    row: Option<Row<R>>,
}

impl<R: Resource> Lookup<R> {
    /// Lookup result.
    #[must_use]
    pub const fn new(row: Option<Row<R>>) -> Self {
        Self { row }
    }

    /// Nothing visible matched.
    #[must_use]
    pub const fn empty() -> Self {
        Self { row: None }
    }

    /// The row, if found.
    #[must_use]
    pub const fn row(&self) -> Option<&Row<R>> {
        self.row.as_ref()
    }

    /// Whether a row was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        self.row.is_some()
    }

    /// Take the row.
    #[must_use]
    pub fn into_row(self) -> Option<Row<R>> {
        self.row
    }
}

impl<R: Resource> Serialize for Lookup<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.row {
            Some(row) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(R::SINGULAR, row)?;
                map.end()
            },
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// Reads of one resource type.
pub struct QueryService<R: Resource> {
    repository: Arc<dyn Repository<R>>,
}

impl<R: Resource> QueryService<R> {
    /// Service reading from `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository<R>>) -> Self {
        Self { repository }
    }

    /// Every row visible to the caller.
    ///
    /// # Errors
    ///
    /// [`QueryError::Unauthorized`] without a principal,
    /// [`QueryError::Persistence`] if the store fails.
    #[tracing::instrument(skip(self, ctx), fields(resource = R::PLURAL))]
    pub async fn list(&self, ctx: &RequestContext) -> Result<Listing<R>, QueryError> {
        let principal = ctx.require_principal()?;
        metrics::counter!("queries.total", "resource" => R::PLURAL, "kind" => "list").increment(1);

        let rows = self
            .repository
            .list(OwnerFilter::for_resource::<R>(principal))
            .await?;
        tracing::debug!(rows = rows.len(), "Listed rows");
        Ok(Listing::new(rows))
    }

    /// The row with `id`, if visible to the caller.
    ///
    /// Sentinel ids never reach the store.
    ///
    /// # Errors
    ///
    /// [`QueryError::Unauthorized`] without a principal,
    /// [`QueryError::Persistence`] if the store fails.
    #[tracing::instrument(skip(self, ctx), fields(resource = R::PLURAL))]
    pub async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<Lookup<R>, QueryError> {
        let principal = ctx.require_principal()?;
        metrics::counter!("queries.total", "resource" => R::PLURAL, "kind" => "by_id").increment(1);

        if id.trim().is_empty() || is_sentinel(id) {
            return Ok(Lookup::empty());
        }
        let row = self
            .repository
            .find(id.to_string(), OwnerFilter::for_resource::<R>(principal))
            .await?;
        Ok(Lookup::new(row))
    }
}

impl<R: Resource> Clone for QueryService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}
