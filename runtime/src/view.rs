//! Optimistic list views.
//!
//! An [`OptimisticView`] is what a list page holds: a [`Store`] running the
//! [`ListReducer`] over the rows the caller can see. Mutations are projected
//! into the store before the server action runs; revalidation signals for the
//! view's route trigger a refetch that replaces the projection with
//! authoritative rows.
//!
//! ```text
//! mutate ─▶ Optimistic(action) ─▶ store      (renders immediately)
//!        └▶ ActionService::run ─▶ bus ─▶ listener ─▶ refresh ─▶ Revalidated(rows) ─▶ store
//! ```

use crate::actions::ActionService;
use crate::queries::{QueryError, QueryService};
use crate::{Store, StoreError};
use futures::StreamExt;
use nomadhub_core::context::RequestContext;
use nomadhub_core::optimistic::{
    DeletePolicy, ListReducer, ListState, MutationKind, OptimisticAction, ReconcileReport, ViewAction,
};
use nomadhub_core::resource::{Patch, Resource};
use nomadhub_core::revalidation::RevalidationBus;
use nomadhub_core::schema::Validate;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Failure to refresh a view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// The refetch failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The view's store is shut down
    #[error(transparent)]
    Store(#[from] StoreError),
}

type ListStore<R> = Store<ListState<R>, ViewAction<R>, (), ListReducer<R>>;

/// A list view with optimistic echo.
pub struct OptimisticView<R: Resource> {
    store: ListStore<R>,
    queries: Arc<QueryService<R>>,
    ctx: RequestContext,
}

impl<R: Resource> Clone for OptimisticView<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            queries: Arc::clone(&self.queries),
            ctx: self.ctx.clone(),
        }
    }
}

impl<R: Resource> OptimisticView<R> {
    /// View showing `items` for `ctx`.
    #[must_use]
    pub fn new(queries: Arc<QueryService<R>>, ctx: RequestContext, items: Vec<R>, policy: DeletePolicy) -> Self {
        Self {
            store: Store::new(ListState::new(items), ListReducer::with_policy(policy), ()),
            queries,
            ctx,
        }
    }

    /// View populated with the caller's current rows.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the initial read fails.
    pub async fn load(
        queries: Arc<QueryService<R>>,
        ctx: RequestContext,
        policy: DeletePolicy,
    ) -> Result<Self, QueryError> {
        let items = queries.list(&ctx).await?.into_records();
        Ok(Self::new(queries, ctx, items, policy))
    }

    /// Project an action locally. Never fails on content; unknown tags are
    /// ignored by the reducer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn apply(&self, action: OptimisticAction<R::Patch>) -> Result<(), StoreError> {
        self.store.send(ViewAction::Optimistic(action)).await
    }

    /// Refetch and reconcile.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError`] if the refetch fails or the store is shut down.
    pub async fn refresh(&self) -> Result<ReconcileReport, ViewError> {
        let rows = self.queries.list(&self.ctx).await?.into_records();
        self.store.send(ViewAction::Revalidated(rows)).await?;
        Ok(self
            .store
            .state(|state| state.last_reconcile.unwrap_or_default())
            .await)
    }

    /// Snapshot of the rendered entries.
    pub async fn items(&self) -> Vec<R> {
        self.store.state(|state| state.items.clone()).await
    }

    /// Number of entries awaiting confirmation.
    pub async fn pending(&self) -> usize {
        self.store.state(ListState::pending).await
    }

    /// Every action the view reduces, for re-rendering.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ViewAction<R>> {
        self.store.subscribe_actions()
    }

    /// Refresh whenever `bus` signals this view's route.
    ///
    /// The task ends when the bus closes or the view's store shuts down.
    pub fn spawn_revalidation_listener(&self, bus: &dyn RevalidationBus) -> JoinHandle<()> {
        let mut signals = bus.subscribe();
        let view = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                if !signal.concerns::<R>() {
                    continue;
                }
                match view.refresh().await {
                    Ok(report) => tracing::debug!(
                        path = %signal.path,
                        confirmed = report.confirmed,
                        discarded = report.discarded,
                        "View reconciled"
                    ),
                    Err(ViewError::Store(_)) => break,
                    Err(error) => tracing::warn!(%error, path = %signal.path, "View refresh failed"),
                }
            }
        })
    }

    /// Stop accepting actions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.store.shutdown(std::time::Duration::from_secs(1)).await
    }
}

impl<R> OptimisticView<R>
where
    R: Resource + Validate,
{
    /// Project `input` locally, then run the server action.
    ///
    /// Returns the action's user-facing error, if any. The projection is
    /// skipped when `input` cannot be read as a patch at all; the server
    /// action still runs and reports why.
    pub async fn mutate(
        &self,
        actions: &ActionService<R>,
        kind: MutationKind,
        input: serde_json::Value,
    ) -> Option<String> {
        match R::Patch::from_json(&input) {
            Ok(data) => {
                let action = OptimisticAction {
                    action: kind.clone(),
                    data,
                };
                if let Err(error) = self.apply(action).await {
                    tracing::warn!(%error, "Skipped optimistic projection");
                }
            },
            Err(error) => tracing::debug!(%error, "Input not projectable"),
        }
        actions.run(&self.ctx, &kind, &input).await
    }
}
