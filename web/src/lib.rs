//! Axum integration for NomadHub.
//!
//! The HTTP layer is a thin shell over the query and action services:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, multipart, SSE
//! │  - Session resolution                   │  ← Correlation ids, metrics
//! │  - Body parsing, status mapping         │
//! ├─────────────────────────────────────────┤
//! │         Services                        │
//! │  - QueryService (owner-scoped reads)    │
//! │  - ActionService (validated mutations)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **Correlation** id assigned by the middleware
//! 2. **Session** resolved into a `RequestContext` by [`extractors::Authenticated`]
//! 3. **Service call** with the context and the raw JSON body
//! 4. **Map result** to `{ "<key>": ... }` or `{ "error": "..." }`
//!
//! # Example
//!
//! ```ignore
//! let sessions: Sessions = Arc::new(TrustedHeaderResolver::new());
//! let app = Router::new()
//!     .merge(resource_router::<Hub>(ResourceState { queries, actions, sessions }))
//!     .merge(health_router(vec![database_probe]))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod session;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{Authenticated, CorrelationId, Sessions};
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};
pub use session::{SessionResolver, StaticTokenResolver, TrustedHeaderResolver};
