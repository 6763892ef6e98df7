//! # NomadHub Core
//!
//! Core traits and types shared by every NomadHub crate.
//!
//! The platform manages a couple dozen CRUD resources (regions, hubs, events,
//! visa applications, ...). Each resource follows the same three-part shape,
//! and this crate holds the generic half of it:
//!
//! - **Resource**: a record type with an opaque string id, a partial
//!   [`Patch`](resource::Patch) type and static metadata (table, scope, join)
//! - **Optimistic reducer**: a pure projection of pending create/update/delete
//!   actions over local list or singleton state, using sentinel ids
//! - **Schema**: validation of untrusted JSON input into a resource record
//! - **Repository**: the persistence seam, always called with an explicit
//!   owner filter derived from the request's [`Principal`](context::Principal)
//!
//! ## Core Concepts
//!
//! - **State**: Local view state (a list or a singleton)
//! - **Action**: Optimistic mutations and confirmed-state refreshes
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use nomadhub_core::optimistic::{ListReducer, ListState, OptimisticAction, ViewAction};
//! use nomadhub_core::reducer::Reducer;
//!
//! let reducer = ListReducer::<Region>::new();
//! let mut state = ListState::new(vec![region("1", "A")]);
//! reducer.reduce(
//!     &mut state,
//!     ViewAction::Optimistic(OptimisticAction::create(RegionPatch::named("B"))),
//!     &(),
//! );
//! assert_eq!(state.items[1].id, "optimistic");
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Request context and principal
pub mod context;

/// User-facing action errors and error normalization
pub mod error;

/// Optimistic list and singleton reducers
pub mod optimistic;

/// Persistence seam for resources
pub mod repository;

/// Resource and patch traits
pub mod resource;

/// Revalidation signals
pub mod revalidation;

/// Input validation against resource schemas
pub mod schema;

/// Reducer module - The core trait for view logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all state transition logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for CounterReducer {
    ///     type State = CounterState;
    ///     type Action = CounterAction;
    ///     type Environment = ();
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut CounterState,
    ///         action: CounterAction,
    ///         _env: &(),
    ///     ) -> SmallVec<[Effect<CounterAction>; 4]> {
    ///         match action {
    ///             CounterAction::Increment => state.count += 1,
    ///         }
    ///         SmallVec::new()
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates state in place and returns effect descriptions to be
        /// executed by the runtime. Must not perform I/O.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution).
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Wrap an async computation that may feed an action back
        #[must_use]
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures;

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn effect_debug_hides_future() {
        let effect: Effect<u8> = Effect::future(async { Some(1) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");

        let merged: Effect<u8> = Effect::merge(vec![Effect::None]);
        assert_eq!(format!("{merged:?}"), "Effect::Parallel([Effect::None])");
    }
}
