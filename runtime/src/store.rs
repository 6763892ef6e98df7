//! Store runtime: one reducer, its state, and the effects it spawns.
//!
//! Views hold a [`Store`] per page. Every reduced action is broadcast so
//! renderers can redraw; effect futures run on the tokio runtime and feed
//! their resulting action back through [`Store::send`].

use nomadhub_core::{effect::Effect, reducer::Reducer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, watch, RwLock};

/// Default action broadcast capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Errors from [`Store`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// `send()` after `shutdown()`
    #[error("Store is shutting down")]
    ShutdownInProgress,

    /// Effects were still running when the shutdown deadline passed
    #[error("Shutdown timed out with {0} effects still running")]
    ShutdownTimeout(usize),

    /// Effects did not settle in time
    #[error("Timeout waiting for effects")]
    Timeout,
}

/// Runs reducer `R` over state `S`.
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    closed: Arc<AtomicBool>,
    in_flight: Arc<watch::Sender<usize>>,
    actions: broadcast::Sender<A>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Store holding `initial_state`.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_broadcast_capacity(initial_state, reducer, environment, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Store whose action broadcast buffers `capacity` actions per
    /// subscriber before lagging.
    #[must_use]
    pub fn with_broadcast_capacity(initial_state: S, reducer: R, environment: E, capacity: usize) -> Self {
        let (actions, _) = broadcast::channel(capacity.max(1));
        let (in_flight, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            closed: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(in_flight),
            actions,
        }
    }

    /// Reduce `action`, broadcast it, then spawn the effects it returned.
    ///
    /// Returns once the state is updated; effects complete later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`Store::shutdown`].
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }
        metrics::counter!("store.actions.total").increment(1);

        let effects = {
            let mut state = self.state.write().await;
            let start = Instant::now();
            let effects = self.reducer.reduce(&mut state, action.clone(), &self.environment);
            metrics::histogram!("store.reducer.duration_seconds").record(start.elapsed().as_secs_f64());
            effects
        };

        // No subscribers is fine
        let _ = self.actions.send(action);

        for effect in effects {
            self.spawn_effect(effect);
        }
        Ok(())
    }

    fn spawn_effect(&self, effect: Effect<A>) {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.spawn_effect(effect);
                }
            },
            Effect::Future(fut) => {
                self.in_flight.send_modify(|n| *n += 1);
                let store = self.clone();
                tokio::spawn(async move {
                    let _done = InFlight(Arc::clone(&store.in_flight));
                    if let Some(action) = fut.await {
                        if let Err(error) = store.send(action).await {
                            tracing::warn!(%error, "Dropped action produced by effect");
                        }
                    }
                });
            },
        }
    }

    /// Subscribe to every action this store reduces.
    ///
    /// A slow receiver skips ahead with `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.actions.subscribe()
    }

    /// Read state through `f`.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        f(&*self.state.read().await)
    }

    /// Effects currently running.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no effects are running, including effects spawned by
    /// actions that effects fed back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running after
    /// `timeout`.
    pub async fn settled(&self, timeout: Duration) -> Result<(), StoreError> {
        let mut idle = self.in_flight.subscribe();
        tokio::time::timeout(timeout, idle.wait_for(|n| *n == 0))
            .await
            .map_err(|_| StoreError::Timeout)?
            .map(|_| ())
            .map_err(|_| StoreError::Timeout)
    }

    /// Reject new actions, then wait up to `timeout` for running effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
    /// still running at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Store shutting down");
        self.closed.store(true, Ordering::Release);
        self.settled(timeout).await.map_err(|_| {
            let pending = self.pending_effects();
            tracing::error!(pending_effects = pending, "Store shutdown timed out");
            StoreError::ShutdownTimeout(pending)
        })
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            closed: Arc::clone(&self.closed),
            in_flight: Arc::clone(&self.in_flight),
            actions: self.actions.clone(),
        }
    }
}

/// Decrements the in-flight count when an effect task ends, even by panic.
struct InFlight(Arc<watch::Sender<usize>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nomadhub_core::{smallvec, SmallVec};

    #[derive(Debug, Clone, Default)]
    struct Tally {
        value: i32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Bump {
        Now,
        Later,
        TwiceLater,
        Slow,
    }

    #[derive(Debug, Clone)]
    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = Tally;
        type Action = Bump;
        type Environment = ();

        fn reduce(&self, state: &mut Tally, action: Bump, _env: &()) -> SmallVec<[Effect<Bump>; 4]> {
            match action {
                Bump::Now => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                Bump::Later => smallvec![Effect::future(async { Some(Bump::Now) })],
                Bump::TwiceLater => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(Bump::Now) }),
                    Effect::future(async { Some(Bump::Now) }),
                ])],
                Bump::Slow => smallvec![Effect::future(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    None
                })],
            }
        }
    }

    fn store() -> Store<Tally, Bump, (), TallyReducer> {
        Store::new(Tally::default(), TallyReducer, ())
    }

    #[tokio::test]
    async fn test_send_reduces_before_returning() {
        let store = store();
        store.send(Bump::Now).await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effects_feed_back_and_settle() {
        let store = store();
        store.send(Bump::Later).await.unwrap();
        store.send(Bump::TwiceLater).await.unwrap();

        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 3);
        assert_eq!(store.pending_effects(), 0);
    }

    #[tokio::test]
    async fn test_every_reduced_action_is_broadcast() {
        let store = store();
        let mut rx = store.subscribe_actions();

        store.send(Bump::Later).await.unwrap();
        store.settled(Duration::from_secs(1)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Bump::Later);
        assert_eq!(rx.recv().await.unwrap(), Bump::Now);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_actions() {
        let store = store();
        store.shutdown(Duration::from_millis(100)).await.unwrap();
        assert_eq!(store.send(Bump::Now).await.unwrap_err(), StoreError::ShutdownInProgress);
    }

    #[tokio::test]
    async fn test_shutdown_reports_running_effects() {
        let store = store();
        store.send(Bump::Slow).await.unwrap();

        let error = store.shutdown(Duration::from_millis(50)).await.unwrap_err();

        assert_eq!(error, StoreError::ShutdownTimeout(1));
    }
}
