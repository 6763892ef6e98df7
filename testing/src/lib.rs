//! # NomadHub Testing
//!
//! Testing utilities and helpers for NomadHub.
//!
//! This crate provides:
//! - [`ReducerTest`], a Given-When-Then builder for reducers
//! - [`InMemoryRepository`], a repository with spy counters on every mutation
//! - [`RecordingRevalidationBus`], a bus that remembers what was published
//! - [`fixtures`]: small resources (`Region`, `Hub`, `Review`) for tests
//! - [`properties`]: proptest strategies for those resources
//!
//! ## Example
//!
//! ```ignore
//! use nomadhub_testing::{fixtures::Review, InMemoryRepository, RecordingRevalidationBus};
//!
//! #[tokio::test]
//! async fn invalid_payload_never_reaches_the_store() {
//!     let repo = Arc::new(InMemoryRepository::<Review>::new());
//!     let actions = ActionService::new(repo.clone(), Arc::new(RecordingRevalidationBus::new()));
//!
//!     let error = actions.run(&ctx, &MutationKind::Create, &json!({ "rating": 9 })).await;
//!
//!     assert!(error.is_some());
//!     assert_eq!(repo.mutation_count(), 0);
//! }
//! ```


/// In-memory repository with spy counters
pub mod repository;

/// Revalidation bus that records every signal
pub mod revalidation;

/// Resources used across the workspace's tests
pub mod fixtures;

/// Property-based testing utilities using proptest.
pub mod properties {
    use crate::fixtures::{Region, RegionPatch};
    use nomadhub_core::optimistic::{MutationKind, OptimisticAction};
    use proptest::prelude::*;

    /// Regions with short numeric ids (duplicates possible) and capitalized names.
    pub fn regions() -> impl Strategy<Value = Vec<Region>> {
        prop::collection::vec(("[0-9]{1,3}", "[A-Z][a-z]{0,6}"), 0..10).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(id, name)| Region { id, name })
                .collect()
        })
    }

    /// Any action tag, biased towards the three known ones.
    pub fn mutation_kinds() -> impl Strategy<Value = MutationKind> {
        prop_oneof![
            3 => Just(MutationKind::Create),
            3 => Just(MutationKind::Update),
            3 => Just(MutationKind::Delete),
            1 => "[a-z]{1,8}".prop_map(MutationKind::from),
        ]
    }

    /// Optimistic region actions targeting ids `0`–`999`.
    pub fn region_actions() -> impl Strategy<Value = OptimisticAction<RegionPatch>> {
        (
            mutation_kinds(),
            prop::option::of("[0-9]{1,3}"),
            prop::option::of("[A-Z][a-z]{0,6}"),
        )
            .prop_map(|(action, id, name)| OptimisticAction {
                action,
                data: RegionPatch { id, name },
            })
    }
}

/// Install a `tracing` subscriber for test output, once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use reducer_test::ReducerTest;
pub use repository::InMemoryRepository;
pub use revalidation::RecordingRevalidationBus;

#[cfg(test)]
mod tests {
    use super::fixtures::Region;
    use super::properties::{region_actions, regions};
    use nomadhub_core::optimistic::{is_sentinel, ListReducer, ListState, MutationKind, ViewAction};
    use nomadhub_core::reducer::Reducer;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn flagging_reducer_only_grows_on_create(items in regions(), actions in prop::collection::vec(region_actions(), 0..12)) {
            let reducer = ListReducer::<Region>::new();
            let mut state = ListState::new(items.clone());
            let creates = actions.iter().filter(|a| a.action == MutationKind::Create).count();

            for action in actions {
                let effects = reducer.reduce(&mut state, ViewAction::Optimistic(action), &());
                prop_assert!(effects.is_empty());
            }

            prop_assert_eq!(state.items.len(), items.len() + creates);
        }

        #[test]
        fn revalidation_drops_every_pending_entry(items in regions(), actions in prop::collection::vec(region_actions(), 0..12), rows in regions()) {
            let reducer = ListReducer::<Region>::new();
            let mut state = ListState::new(items);
            for action in actions {
                reducer.reduce(&mut state, ViewAction::Optimistic(action), &());
            }

            reducer.reduce(&mut state, ViewAction::Revalidated(rows.clone()), &());

            prop_assert_eq!(&state.items, &rows);
            prop_assert!(state.items.iter().all(|item| !is_sentinel(&item.id)));
            prop_assert_eq!(state.pending(), 0);
        }
    }

    #[test]
    fn init_tracing_is_idempotent() {
        super::init_tracing();
        super::init_tracing();
    }
}
