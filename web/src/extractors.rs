//! Custom Axum extractors.
//!
//! - `CorrelationId`: the id assigned by [`crate::middleware::correlation_id_layer`]
//! - `Authenticated`: the caller's [`RequestContext`], or 401
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(Authenticated(ctx): Authenticated) -> Result<Json<Listing<Hub>>, AppError> {
//!     Ok(Json(queries.list(&ctx).await?))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use crate::session::SessionResolver;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use nomadhub_core::context::RequestContext;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// Shared session resolver, reachable from router state via [`FromRef`].
pub type Sessions = Arc<dyn SessionResolver>;

/// Correlation ID for request tracing.
///
/// Read from request extensions when the middleware is installed, else from
/// the `X-Correlation-ID` header, else freshly generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// A new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied id if it is non-blank and at most 128 bytes.
    #[must_use]
    pub fn accept(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty() && raw.len() <= 128).then(|| Self(raw.to_string()))
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(id.clone());
        }
        Ok(parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::accept)
            .unwrap_or_else(Self::generate))
    }
}

/// The authenticated caller's context.
///
/// Rejects with `401 {"error":"Unauthorized"}` when the session resolver
/// finds no principal.
#[derive(Debug, Clone)]
pub struct Authenticated(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    Sessions: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Sessions::from_ref(state);
        let Some(principal) = sessions.resolve(&parts.headers) else {
            tracing::debug!("Request without a session");
            return Err(AppError::unauthorized());
        };

        let correlation_id = CorrelationId::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        tracing::Span::current().record("user_id", principal.user_id.as_str());

        Ok(Self(
            RequestContext::authenticated(principal).with_correlation_id(correlation_id.0),
        ))
    }
}
