//! Prometheus metrics for observability and monitoring.
//!
//! Metric names recorded across the workspace:
//! - `actions.total`, `actions.failed`, `actions.validation_failed`
//!   (labels `resource`, `kind`)
//! - `queries.total` (labels `resource`, `kind`)
//! - `revalidations.published`
//! - `store.actions.total`, `store.reducer.duration_seconds`
//! - `uploads.total`, `uploads.rejected`
//! - `repository.query.duration_seconds`, `repository.errors`
//!   (labels `table`, `operation`)
//! - `http.requests.total` (labels `method`, `status`),
//!   `http.request.duration_seconds` (label `method`)
//!
//! # Example
//!
//! ```rust,no_run
//! use nomadhub_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics recorder plus the address its scrape endpoint is
/// served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should be bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`MetricsServer::handle`] empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("actions.total", "Server actions attempted");
    describe_counter!(
        "actions.failed",
        "Server actions rejected as unauthorized or failed in the store"
    );
    describe_counter!(
        "actions.validation_failed",
        "Server actions rejected by schema validation"
    );
    describe_counter!("queries.total", "Scoped reads performed");
    describe_counter!("revalidations.published", "Revalidation signals published");
    describe_counter!("store.actions.total", "Actions reduced by view stores");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside reducers"
    );
    describe_counter!("uploads.total", "Files stored");
    describe_counter!("uploads.rejected", "Uploads rejected by validation");
    describe_histogram!(
        "repository.query.duration_seconds",
        "Time spent in repository statements"
    );
    describe_counter!("repository.errors", "Repository statements that failed");
    describe_counter!("http.requests.total", "HTTP requests served");
    describe_histogram!(
        "http.request.duration_seconds",
        "HTTP request latency"
    );
}
