//! # NomadHub Runtime
//!
//! Runtime implementation for NomadHub views and server services.
//!
//! ## Core Components
//!
//! - **Store**: Runs a reducer over state, executes its effects and
//!   broadcasts every reduced action to observers
//! - **`QueryService`**: Owner-scoped list and by-id reads
//! - **`ActionService`**: Validated create/update/delete with revalidation
//! - **`InMemoryRevalidationBus`**: In-process fan-out of revalidation signals
//! - **`OptimisticView`**: A list view combining the optimistic reducer, a
//!   query service and a revalidation subscription
//!
//! ## Example
//!
//! ```ignore
//! use nomadhub_runtime::{ActionService, InMemoryRevalidationBus, OptimisticView, QueryService};
//!
//! let bus = Arc::new(InMemoryRevalidationBus::new());
//! let queries = Arc::new(QueryService::new(repository.clone()));
//! let actions = ActionService::new(repository, bus.clone());
//!
//! let view = OptimisticView::load(queries, ctx.clone(), DeletePolicy::Flag).await?;
//! view.spawn_revalidation_listener(bus.as_ref());
//!
//! // Renders immediately, reconciles once the server confirms.
//! let error = view.mutate(&actions, MutationKind::Create, json!({ "name": "Andes" })).await;
//! ```

/// Validated mutations
pub mod actions;

/// Component health reporting
pub mod health;

/// Prometheus metrics for observability
pub mod metrics;

/// Owner-scoped reads
pub mod queries;

/// In-process revalidation bus
pub mod revalidation;

/// Reducer runtime
pub mod store;

/// Optimistic list views
pub mod view;

pub use actions::ActionService;
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use queries::{Listing, Lookup, QueryError, QueryService};
pub use revalidation::InMemoryRevalidationBus;
pub use store::{Store, StoreError};
pub use view::{OptimisticView, ViewError};
