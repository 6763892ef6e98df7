//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use nomadhub_runtime::{HealthCheck, HealthReport};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A dependency checked by the readiness endpoint.
pub trait ReadinessProbe: Send + Sync {
    /// Probe the dependency.
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>>;
}

/// Liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liveness {
    /// Always `"ok"`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, etc.).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness: every probe, aggregated.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: any probe Unhealthy
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(
    State(probes): State<Arc<Vec<Arc<dyn ReadinessProbe>>>>,
) -> (StatusCode, Json<HealthReport>) {
    let checks = futures::future::join_all(probes.iter().map(|probe| probe.check())).await;
    let report = HealthReport::new(checks);

    let status = if report.status.is_unhealthy() {
        tracing::warn!(status = %report.status, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(report))
}

/// `/health` and `/ready`.
pub fn health_router(probes: Vec<Arc<dyn ReadinessProbe>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(Arc::new(probes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomadhub_runtime::HealthStatus;

    struct Fixed(HealthStatus);

    impl ReadinessProbe for Fixed {
        fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
            let check = match self.0 {
                HealthStatus::Healthy => HealthCheck::healthy("fixed"),
                HealthStatus::Degraded => HealthCheck::degraded("fixed", "slow"),
                HealthStatus::Unhealthy => HealthCheck::unhealthy("fixed", "down"),
            };
            Box::pin(async move { check })
        }
    }

    fn probes(statuses: &[HealthStatus]) -> State<Arc<Vec<Arc<dyn ReadinessProbe>>>> {
        State(Arc::new(
            statuses
                .iter()
                .map(|status| Arc::new(Fixed(*status)) as Arc<dyn ReadinessProbe>)
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_degraded_is_still_ready() {
        let (status, Json(report)) =
            readiness_check(probes(&[HealthStatus::Healthy, HealthStatus::Degraded])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_unhealthy_probe_fails_readiness() {
        let (status, Json(report)) =
            readiness_check(probes(&[HealthStatus::Unhealthy, HealthStatus::Healthy])).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }
}
