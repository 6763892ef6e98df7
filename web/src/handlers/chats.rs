//! Chat routes.
//!
//! Chats share the generic list/create/delete handlers, but a single chat
//! is returned as its bare fields rather than wrapped under its singular key:
//!
//! ```text
//! GET /api/chats/:id  → 200 { "id": ..., "title": ..., ... } | 404 {"error":"Chat not found"}
//! ```

use super::resources::{self, not_found, ResourceState};
use crate::error::AppError;
use crate::extractors::Authenticated;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use nomadhub_core::resource::{Resource, Row};
use nomadhub_core::schema::Validate;

/// Routes for the chat resource `R` under `/api/<plural>`.
pub fn chat_router<R>(state: ResourceState<R>) -> Router
where
    R: Resource + Validate,
{
    Router::new()
        .route(
            &resources::collection_path::<R>(),
            get(resources::list::<R>).post(resources::create::<R>),
        )
        .route(
            &resources::member_path::<R>(),
            get(get_chat::<R>).delete(resources::remove::<R>),
        )
        .with_state(state)
}

async fn get_chat<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
    Path(chat_id): Path<String>,
) -> Result<Json<Row<R>>, AppError>
where
    R: Resource + Validate,
{
    state
        .queries
        .get_by_id(&ctx, &chat_id)
        .await?
        .into_row()
        .map(Json)
        .ok_or_else(not_found::<R>)
}
