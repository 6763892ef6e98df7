//! Revalidation stream.
//!
//! `GET /api/revalidations` forwards every signal from the bus as a
//! server-sent event named `revalidate`, with `{"path": "/hubs"}` as data.

use crate::extractors::{Authenticated, Sessions};
use axum::{
    extract::{FromRef, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};
use nomadhub_core::revalidation::RevalidationBus;
use std::sync::Arc;

/// Route of the stream.
pub const REVALIDATIONS_PATH: &str = "/api/revalidations";

/// Services behind the stream.
#[derive(Clone)]
pub struct RevalidationState {
    /// Source of signals
    pub bus: Arc<dyn RevalidationBus>,
    /// Resolves the caller from request headers
    pub sessions: Sessions,
}

impl FromRef<RevalidationState> for Sessions {
    fn from_ref(state: &RevalidationState) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// The stream route.
pub fn revalidation_router(state: RevalidationState) -> Router {
    Router::new()
        .route(REVALIDATIONS_PATH, get(stream))
        .with_state(state)
}

async fn stream(
    State(state): State<RevalidationState>,
    Authenticated(ctx): Authenticated,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(user_id = ?ctx.principal().map(|p| p.user_id.as_str()), "Revalidation stream opened");
    let events = state
        .bus
        .subscribe()
        .map(|signal| Event::default().event("revalidate").json_data(signal));
    Sse::new(events).keep_alive(KeepAlive::default())
}
