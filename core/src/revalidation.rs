//! Revalidation signals.
//!
//! After a mutation, the action layer announces which list route is stale.
//! Views rendering that route refetch and reconcile their optimistic state.
//!
//! ```text
//! action ──publish(/hubs)──▶ bus ──▶ OptimisticView<Hub> ──refetch──▶ Revalidated(rows)
//! ```

use crate::resource::Resource;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// "The view rendered at `path` is stale."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revalidation {
    /// Route path, e.g. `/hubs`
    pub path: String,
}

impl Revalidation {
    /// Signal for an arbitrary path.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Signal for the list route of `R`.
    #[must_use]
    pub fn for_resource<R: Resource>() -> Self {
        Self {
            path: R::list_path(),
        }
    }

    /// Whether this signal invalidates `R`'s list route.
    #[must_use]
    pub fn concerns<R: Resource>(&self) -> bool {
        self.path == R::list_path()
    }
}

/// Stream of signals from a subscription.
pub type RevalidationStream = Pin<Box<dyn Stream<Item = Revalidation> + Send>>;

/// Fan-out channel for revalidation signals.
pub trait RevalidationBus: Send + Sync {
    /// Announce a stale path. Never blocks; signals with no subscriber are dropped.
    fn publish(&self, signal: Revalidation);

    /// Receive every signal published after this call.
    fn subscribe(&self) -> RevalidationStream;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Hub, Region};

    #[test]
    fn resource_signal_targets_list_route() {
        let signal = Revalidation::for_resource::<Hub>();
        assert_eq!(signal.path, "/hubs");
        assert!(signal.concerns::<Hub>());
        assert!(!signal.concerns::<Region>());
    }
}
