//! Persistence seam for resources.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
//! so services can hold `Arc<dyn Repository<R>>`.

use crate::context::Principal;
use crate::resource::{Resource, Row, Scope};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by a repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Connection or query failure
    #[error("{0}")]
    Database(String),

    /// A row could not be decoded into the resource type
    #[error("Failed to decode {resource} row: {reason}")]
    Decode {
        /// Resource table
        resource: &'static str,
        /// Decoder message
        reason: String,
    },
}

/// Restricts a query to rows owned by one principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    /// Ownership column
    pub column: &'static str,
    /// Required value of the ownership column
    pub user_id: String,
}

impl OwnerFilter {
    /// Filter for `R` as seen by `principal`; `None` for shared resources.
    #[must_use]
    pub fn for_resource<R: Resource>(principal: &Principal) -> Option<Self> {
        match R::SCOPE {
            Scope::Shared => None,
            Scope::Owned { column } => Some(Self {
                column,
                user_id: principal.user_id.clone(),
            }),
        }
    }
}

/// Boxed repository future.
pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Storage for one resource type.
///
/// Every call carries the owner filter explicitly; `None` means the
/// resource is shared. Each method is exactly one statement against the
/// store.
pub trait Repository<R: Resource>: Send + Sync {
    /// All visible rows, with the parent attached when `R` declares a join.
    fn list(&self, owner: Option<OwnerFilter>) -> RepoFuture<'_, Vec<Row<R>>>;

    /// One visible row by id.
    ///
    /// Returns `Ok(None)` both when no row exists and when it belongs to
    /// someone else.
    fn find(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<Row<R>>>;

    /// Insert `record`, assigning a fresh id and, for owned resources, the
    /// owner column. Returns the stored row.
    fn insert(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, R>;

    /// Overwrite the row with `record.id()`. `Ok(None)` when no visible row
    /// matched.
    fn update(&self, record: R, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>>;

    /// Delete the row with `id`. `Ok(None)` when no visible row matched.
    fn delete(&self, id: String, owner: Option<OwnerFilter>) -> RepoFuture<'_, Option<R>>;
}
