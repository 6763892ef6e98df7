//! Router assembly and server lifecycle.
//!
//! ```text
//! Config ──▶ sessions, storage, pool ──▶ build_router ──▶ serve (until Ctrl+C / SIGTERM)
//!                                                    └──▶ metrics_router on METRICS_PORT
//! ```

use crate::config::{AuthConfig, AuthMode};
use crate::resources::{Chat, Community, Event, Hub, Proof, Region, RegionalState, Review, VisaApplication};
use axum::{routing::get, Router};
use nomadhub_core::repository::Repository;
use nomadhub_core::resource::Resource;
use nomadhub_core::revalidation::RevalidationBus;
use nomadhub_core::schema::Validate;
use nomadhub_postgres::PgRepository;
use nomadhub_runtime::metrics::MetricsServer;
use nomadhub_runtime::{ActionService, HealthCheck, QueryService};
use nomadhub_web::handlers::{
    chat_router, health_router, resource_router, revalidation_router, upload_router, ObjectStorage,
    ReadinessProbe, ResourceState, RevalidationState, UploadPolicy, UploadState,
};
use nomadhub_web::session::TokenParseError;
use nomadhub_web::{correlation_id_layer, Sessions, StaticTokenResolver, TrustedHeaderResolver};
use sqlx::PgPool;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Source of one repository per resource type.
pub trait RepositoryFactory {
    /// Repository for `R`.
    fn repository<R: Resource>(&self) -> Arc<dyn Repository<R>>;
}

impl RepositoryFactory for PgPool {
    fn repository<R: Resource>(&self) -> Arc<dyn Repository<R>> {
        Arc::new(PgRepository::<R>::new(self.clone()))
    }
}

/// Shared services every route group draws from.
pub struct AppServices {
    /// Resolves callers from request headers
    pub sessions: Sessions,
    /// Where actions announce stale routes
    pub revalidation: Arc<dyn RevalidationBus>,
    /// Upload backend
    pub storage: Arc<dyn ObjectStorage>,
    /// Upload limits
    pub upload_policy: UploadPolicy,
    /// Dependencies checked by `/ready`
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
}

/// Session resolver for the configured mode.
///
/// # Errors
///
/// Returns [`TokenParseError`] if token mode is configured with a malformed
/// `AUTH_TOKENS`.
pub fn sessions_from_config(auth: &AuthConfig) -> Result<Sessions, TokenParseError> {
    let sessions: Sessions = match auth.mode {
        AuthMode::Header => Arc::new(TrustedHeaderResolver::new()),
        AuthMode::Tokens => Arc::new(StaticTokenResolver::parse(&auth.tokens)?),
    };
    if let Some(message) = auth_warning(auth) {
        warn!(mode = ?auth.mode, "{message}");
    }
    Ok(sessions)
}

fn auth_warning(auth: &AuthConfig) -> Option<&'static str> {
    match auth.mode {
        AuthMode::Header => Some(
            "AUTH_MODE=header trusts x-user-id from any client; expose the server only behind the auth proxy",
        ),
        AuthMode::Tokens if auth.tokens.split(',').all(|entry| entry.trim().is_empty()) => {
            Some("AUTH_MODE=tokens without AUTH_TOKENS: every request will be unauthorized")
        },
        AuthMode::Tokens => None,
    }
}

fn resource_state<R, F>(repos: &F, services: &AppServices) -> ResourceState<R>
where
    R: Resource + Validate,
    F: RepositoryFactory,
{
    let repository = repos.repository::<R>();
    ResourceState {
        queries: QueryService::new(Arc::clone(&repository)),
        actions: ActionService::new(repository, Arc::clone(&services.revalidation)),
        sessions: Arc::clone(&services.sessions),
    }
}

/// The complete API router.
pub fn build_router<F: RepositoryFactory>(repos: &F, services: AppServices) -> Router {
    let api = Router::new()
        .merge(resource_router(resource_state::<Region, _>(repos, &services)))
        .merge(resource_router(resource_state::<RegionalState, _>(repos, &services)))
        .merge(resource_router(resource_state::<Hub, _>(repos, &services)))
        .merge(resource_router(resource_state::<Event, _>(repos, &services)))
        .merge(resource_router(resource_state::<VisaApplication, _>(repos, &services)))
        .merge(resource_router(resource_state::<Proof, _>(repos, &services)))
        .merge(resource_router(resource_state::<Review, _>(repos, &services)))
        .merge(resource_router(resource_state::<Community, _>(repos, &services)))
        .merge(chat_router(resource_state::<Chat, _>(repos, &services)))
        .merge(upload_router(UploadState {
            storage: Arc::clone(&services.storage),
            policy: services.upload_policy.clone(),
            sessions: Arc::clone(&services.sessions),
        }))
        .merge(revalidation_router(RevalidationState {
            bus: Arc::clone(&services.revalidation),
            sessions: Arc::clone(&services.sessions),
        }));

    Router::new()
        .merge(api)
        .merge(health_router(services.probes))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

/// `GET /metrics` in Prometheus text format.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    )
}

/// Readiness probe pinging the database.
#[derive(Clone)]
pub struct DatabaseProbe {
    pool: PgPool,
}

impl DatabaseProbe {
    /// Probe for `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReadinessProbe for DatabaseProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match nomadhub_postgres::ping(&self.pool).await {
                Ok(()) => HealthCheck::healthy("database")
                    .with_metadata("connections", self.pool.size().to_string()),
                Err(error) => HealthCheck::unhealthy("database", error.to_string()),
            }
        })
    }
}

/// Serve `app` on `listener` until a shutdown signal, then give in-flight
/// requests `timeout` to finish.
///
/// # Errors
///
/// Returns error if the server fails.
pub async fn serve(listener: tokio::net::TcpListener, app: Router, timeout: Duration) -> anyhow::Result<()> {
    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(true);
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return Ok(joined??),
        _ = signalled_rx.changed() => {},
    }

    info!(timeout_secs = timeout.as_secs(), "Draining in-flight requests");
    match tokio::time::timeout(timeout, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!("Graceful shutdown timed out"),
    }
    info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
