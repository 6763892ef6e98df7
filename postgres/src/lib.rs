//! `PostgreSQL` persistence for NomadHub.
//!
//! One generic [`PgRepository<R>`] serves every resource. Statements are built
//! from the resource's static metadata (table, columns, owner column, join),
//! and rows travel as JSON (`to_jsonb` on the way out,
//! `jsonb_populate_record` on the way in), so no per-resource SQL is written
//! by hand.
//!
//! Expected schema per resource: a table named [`Resource::TABLE`] with a
//! UUID `id`, one column per field, and, for owned resources, the owner
//! column. Server-managed columns get their values from column defaults.
//!
//! # Example
//!
//! ```ignore
//! use nomadhub_postgres::{connect, PgRepository, PoolConfig};
//!
//! let pool = connect(&PoolConfig::new("postgres://localhost/nomadhub")).await?;
//! let hubs = PgRepository::<Hub>::new(pool.clone());
//! let rows = hubs.list(None).await?;
//! ```
//!
//! [`Resource::TABLE`]: nomadhub_core::resource::Resource::TABLE

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod pool;
mod repository;
pub mod sql;

pub use pool::{connect, ping, PoolConfig};
pub use repository::PgRepository;

use nomadhub_core::repository::PersistenceError;

/// Map a driver error to the message a user may see.
///
/// Errors reported by the server keep only their message; connection and
/// protocol failures keep the driver's description.
pub(crate) fn database_error(error: &sqlx::Error) -> PersistenceError {
    let message = match error.as_database_error() {
        Some(db) => db.message().to_string(),
        None => error.to_string(),
    };
    PersistenceError::Database(message)
}
