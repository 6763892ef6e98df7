//! Generic CRUD routes.
//!
//! ```text
//! GET    /api/<plural>        → 200 { "<plural>": [...] }
//! POST   /api/<plural>        → 201 { "<singular>": {...} }
//! GET    /api/<plural>/:id    → 200 { "<singular>": {...} } | 404
//! PUT    /api/<plural>/:id    → 200 { "<singular>": {...} } | 404
//! DELETE /api/<plural>/:id    → 200 { "<singular>": {...} } | 404
//! ```
//!
//! Every route requires a session and goes through the query or action
//! service, so owner scoping and validation are never re-implemented here.

use crate::error::AppError;
use crate::extractors::{Authenticated, Sessions};
use axum::{
    body::Bytes,
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use nomadhub_core::resource::{Resource, ID_FIELD};
use nomadhub_core::schema::Validate;
use nomadhub_runtime::{ActionService, Listing, Lookup, QueryService};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

/// Services behind one resource's routes.
pub struct ResourceState<R: Resource> {
    /// Owner-scoped reads
    pub queries: QueryService<R>,
    /// Validated mutations
    pub actions: ActionService<R>,
    /// Resolves the caller from request headers
    pub sessions: Sessions,
}

impl<R: Resource> Clone for ResourceState<R> {
    fn clone(&self) -> Self {
        Self {
            queries: self.queries.clone(),
            actions: self.actions.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<R: Resource> FromRef<ResourceState<R>> for Sessions {
    fn from_ref(state: &ResourceState<R>) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// A mutated record, rendered as `{ "<singular>": {...} }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Single<R: Resource>(pub R);

impl<R: Resource> Serialize for Single<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(R::SINGULAR, &self.0)?;
        map.end()
    }
}

/// Routes for `R` under `/api/<plural>`.
pub fn resource_router<R>(state: ResourceState<R>) -> Router
where
    R: Resource + Validate,
{
    Router::new()
        .route(&collection_path::<R>(), get(list::<R>).post(create::<R>))
        .route(
            &member_path::<R>(),
            get(show::<R>).put(update::<R>).delete(remove::<R>),
        )
        .with_state(state)
}

pub(crate) fn collection_path<R: Resource>() -> String {
    format!("/api/{}", R::PLURAL)
}

pub(crate) fn member_path<R: Resource>() -> String {
    format!("/api/{}/:id", R::PLURAL)
}

/// `"<Singular> not found"`, with underscores as spaces.
pub(crate) fn not_found<R: Resource>() -> AppError {
    let words = R::SINGULAR.replace('_', " ");
    let mut chars = words.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::from("Record"),
    };
    AppError::not_found(format!("{label} not found"))
}

/// Parse a request body as JSON.
pub(crate) fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|error| {
        tracing::debug!(%error, "Rejected request body");
        AppError::bad_request("Invalid JSON body")
    })
}

pub(crate) async fn list<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<Listing<R>>, AppError>
where
    R: Resource + Validate,
{
    Ok(Json(state.queries.list(&ctx).await?))
}

async fn show<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Lookup<R>>, AppError>
where
    R: Resource + Validate,
{
    let lookup = state.queries.get_by_id(&ctx, &id).await?;
    if lookup.is_found() {
        Ok(Json(lookup))
    } else {
        Err(not_found::<R>())
    }
}

pub(crate) async fn create<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
    body: Bytes,
) -> Result<(StatusCode, Json<Single<R>>), AppError>
where
    R: Resource + Validate,
{
    let input = parse_body(&body)?;
    let record = state.actions.create(&ctx, &input).await?;
    Ok((StatusCode::CREATED, Json(Single(record))))
}

async fn update<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Single<R>>, AppError>
where
    R: Resource + Validate,
{
    let mut input = parse_body(&body)?;
    if let Some(object) = input.as_object_mut() {
        object.insert(ID_FIELD.to_string(), Value::String(id));
    }
    state
        .actions
        .update(&ctx, &input)
        .await?
        .map(|record| Json(Single(record)))
        .ok_or_else(not_found::<R>)
}

pub(crate) async fn remove<R>(
    State(state): State<ResourceState<R>>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Single<R>>, AppError>
where
    R: Resource + Validate,
{
    let input = serde_json::json!({ ID_FIELD: id });
    state
        .actions
        .delete(&ctx, &input)
        .await?
        .map(|record| Json(Single(record)))
        .ok_or_else(not_found::<R>)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nomadhub_testing::fixtures::{Hub, Region, Review};

    #[test]
    fn test_paths() {
        assert_eq!(collection_path::<Hub>(), "/api/hubs");
        assert_eq!(member_path::<Review>(), "/api/reviews/:id");
    }

    #[test]
    fn test_not_found_message_names_resource() {
        assert_eq!(not_found::<Region>().message(), "Region not found");
        assert_eq!(not_found::<Region>().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_single_wraps_under_singular() {
        let value = serde_json::to_value(Single(Region::new("r1", "Andes"))).unwrap_or_default();
        assert_eq!(value, serde_json::json!({ "region": { "id": "r1", "name": "Andes" } }));
    }

    #[test]
    fn test_invalid_body_is_bad_request() {
        let err = parse_body(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.message(), "Invalid JSON body");
    }
}
