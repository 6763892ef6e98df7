//! NomadHub server.
//!
//! Domain resources, environment configuration and the assembled HTTP
//! application. The `nomadhub` binary wires these to `PostgreSQL`, local
//! upload storage and a Prometheus endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ /api/<plural>[/:id]   resource_router × 8     │
//! │ /api/chats[/:id]      chat_router             │
//! │ /api/files/upload     upload_router           │
//! │ /api/revalidations    revalidation_router     │
//! │ /health, /ready       health_router           │
//! ├───────────────────────────────────────────────┤
//! │ QueryService / ActionService per resource     │
//! ├───────────────────────────────────────────────┤
//! │ RepositoryFactory (PgPool in production)      │
//! └───────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod resources;

pub use app::{build_router, metrics_router, serve, sessions_from_config, AppServices, DatabaseProbe, RepositoryFactory};
pub use config::{Config, ConfigError};
