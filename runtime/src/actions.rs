//! Validated mutations.
//!
//! An action takes untrusted JSON and, in order:
//!
//! 1. requires a principal (`Unauthorized` otherwise, before anything else)
//! 2. parses the payload against the resource schema
//! 3. calls exactly one repository mutation, scoped to the principal
//! 4. publishes a revalidation signal for the resource's list route
//!
//! Failures never escape [`ActionService::run`]: they come back as the short
//! message from [`ActionError::user_message`].

use nomadhub_core::context::RequestContext;
use nomadhub_core::error::ActionError;
use nomadhub_core::optimistic::MutationKind;
use nomadhub_core::repository::{OwnerFilter, Repository};
use nomadhub_core::resource::Resource;
use nomadhub_core::revalidation::{Revalidation, RevalidationBus};
use nomadhub_core::schema::{parse_id, parse_insert, parse_update, Validate};
use std::sync::Arc;

/// Mutations of one resource type.
pub struct ActionService<R: Resource> {
    repository: Arc<dyn Repository<R>>,
    revalidation: Arc<dyn RevalidationBus>,
}

impl<R: Resource> Clone for ActionService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            revalidation: Arc::clone(&self.revalidation),
        }
    }
}

impl<R> ActionService<R>
where
    R: Resource + Validate,
{
    /// Service writing to `repository` and announcing on `revalidation`.
    #[must_use]
    pub fn new(repository: Arc<dyn Repository<R>>, revalidation: Arc<dyn RevalidationBus>) -> Self {
        Self {
            repository,
            revalidation,
        }
    }

    /// Run a tagged action, returning `None` on success or a message on
    /// failure.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        kind: &MutationKind,
        input: &serde_json::Value,
    ) -> Option<String> {
        let outcome = match kind {
            MutationKind::Create => self.create(ctx, input).await.map(|_| ()),
            MutationKind::Update => self.update(ctx, input).await.map(|_| ()),
            MutationKind::Delete => self.delete(ctx, input).await.map(|_| ()),
            MutationKind::Other(tag) => Err(ActionError::operation(format!("Unsupported action: {tag}"))),
        };
        outcome.err().map(|error| error.user_message())
    }

    /// Insert a new record; returns the stored row.
    ///
    /// # Errors
    ///
    /// [`ActionError::Validation`] for bad input, [`ActionError::Operation`]
    /// when unauthorized or when the store fails.
    #[tracing::instrument(skip(self, ctx, input), fields(resource = R::PLURAL, kind = "create"))]
    pub async fn create(&self, ctx: &RequestContext, input: &serde_json::Value) -> Result<R, ActionError> {
        let owner = Self::authorize(ctx, "create")?;
        let record = Self::validated("create", parse_insert::<R>(input))?;

        let stored = Self::guard("create", self.repository.insert(record, owner).await)?;
        tracing::info!(id = stored.id(), "Created");
        self.revalidate();
        Ok(stored)
    }

    /// Overwrite the record with the payload's `id`.
    ///
    /// Returns `Ok(None)` when no row visible to the caller matched.
    ///
    /// # Errors
    ///
    /// [`ActionError::Validation`] for bad input, [`ActionError::Operation`]
    /// when unauthorized or when the store fails.
    #[tracing::instrument(skip(self, ctx, input), fields(resource = R::PLURAL, kind = "update"))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        input: &serde_json::Value,
    ) -> Result<Option<R>, ActionError> {
        let owner = Self::authorize(ctx, "update")?;
        let record = Self::validated("update", parse_update::<R>(input))?;

        let id = record.id().to_string();
        let updated = Self::guard("update", self.repository.update(record, owner).await)?;
        if updated.is_none() {
            tracing::debug!(%id, "Update matched no visible row");
        }
        self.revalidate();
        Ok(updated)
    }

    /// Delete the record with the payload's `id`.
    ///
    /// Returns `Ok(None)` when no row visible to the caller matched.
    ///
    /// # Errors
    ///
    /// [`ActionError::Validation`] without an id, [`ActionError::Operation`]
    /// when unauthorized or when the store fails.
    #[tracing::instrument(skip(self, ctx, input), fields(resource = R::PLURAL, kind = "delete"))]
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        input: &serde_json::Value,
    ) -> Result<Option<R>, ActionError> {
        let owner = Self::authorize(ctx, "delete")?;
        let id = Self::validated("delete", parse_id(input))?;

        let deleted = Self::guard("delete", self.repository.delete(id.clone(), owner).await)?;
        if deleted.is_none() {
            tracing::debug!(%id, "Delete matched no visible row");
        }
        self.revalidate();
        Ok(deleted)
    }

    fn authorize(ctx: &RequestContext, kind: &'static str) -> Result<Option<OwnerFilter>, ActionError> {
        metrics::counter!("actions.total", "resource" => R::PLURAL, "kind" => kind).increment(1);
        match ctx.require_principal() {
            Ok(principal) => Ok(OwnerFilter::for_resource::<R>(principal)),
            Err(unauthorized) => {
                tracing::warn!("Rejected unauthenticated action");
                metrics::counter!("actions.failed", "resource" => R::PLURAL, "kind" => kind).increment(1);
                Err(unauthorized.into())
            },
        }
    }

    fn validated<T>(
        kind: &'static str,
        parsed: Result<T, nomadhub_core::schema::ValidationError>,
    ) -> Result<T, ActionError> {
        parsed.map_err(|error| {
            tracing::debug!(fields = ?error.fields(), "Validation failed");
            metrics::counter!("actions.validation_failed", "resource" => R::PLURAL, "kind" => kind)
                .increment(1);
            ActionError::from(error)
        })
    }

    fn guard<T>(
        kind: &'static str,
        result: Result<T, nomadhub_core::repository::PersistenceError>,
    ) -> Result<T, ActionError> {
        result.map_err(|error| {
            tracing::error!(%error, "Mutation failed");
            metrics::counter!("actions.failed", "resource" => R::PLURAL, "kind" => kind).increment(1);
            ActionError::from(error)
        })
    }

    fn revalidate(&self) {
        self.revalidation.publish(Revalidation::for_resource::<R>());
    }
}
