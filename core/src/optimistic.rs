//! Optimistic list and singleton reducers.
//!
//! A view renders confirmed server state plus every mutation the user fired
//! but the server has not yet confirmed. Pending creates and deletes are
//! tagged with a sentinel id:
//!
//! - [`OPTIMISTIC_ID`]: created locally, not yet persisted
//! - [`DELETE_ID`]: removal requested, not yet confirmed
//!
//! Edited entries keep their real id, so later edits and deletes of the same
//! row still find it. Their ids are tracked in the state's `pending_updates`.
//!
//! When the server revalidates, [`ViewAction::Revalidated`] replaces the whole
//! state with authoritative rows. Sentinel entries are matched against those
//! rows by content, edited entries by id and content, and the outcome is
//! counted in a [`ReconcileReport`]. Failed mutations need no rollback: their
//! entries simply do not survive the refresh.
//!
//! Reducers never fail. An unrecognized action tag leaves state untouched.

use crate::effect::Effect;
use crate::reducer::Reducer;
use crate::resource::{Patch, Resource};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// Id of an entry created locally and not yet persisted.
pub const OPTIMISTIC_ID: &str = "optimistic";

/// Id of an entry whose removal is pending.
pub const DELETE_ID: &str = "delete";

/// Whether `id` is one of the reserved sentinel ids.
#[must_use]
pub fn is_sentinel(id: &str) -> bool {
    id == OPTIMISTIC_ID || id == DELETE_ID
}

/// Tag of an optimistic action.
///
/// Parsed leniently: any tag other than the three known ones becomes
/// [`MutationKind::Other`], which every reducer treats as identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MutationKind {
    /// `"create"`
    Create,
    /// `"update"`
    Update,
    /// `"delete"`
    Delete,
    /// Anything else
    Other(String),
}

impl MutationKind {
    /// Wire name of the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for MutationKind {
    fn from(tag: &str) -> Self {
        match tag {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MutationKind {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<MutationKind> for String {
    fn from(kind: MutationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ action, data }`: one locally-projected mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimisticAction<P> {
    /// Which mutation
    pub action: MutationKind,
    /// Partial record carried by the mutation
    pub data: P,
}

impl<P> OptimisticAction<P> {
    /// Project a create.
    pub const fn create(data: P) -> Self {
        Self {
            action: MutationKind::Create,
            data,
        }
    }

    /// Project an update of the entry whose id is `data.id`.
    pub const fn update(data: P) -> Self {
        Self {
            action: MutationKind::Update,
            data,
        }
    }

    /// Project a delete of the entry whose id is `data.id`.
    pub const fn delete(data: P) -> Self {
        Self {
            action: MutationKind::Delete,
            data,
        }
    }
}

/// What a pending delete does to local state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Keep the entry, retagged with [`DELETE_ID`] so the view can render it
    /// as "removing".
    #[default]
    Flag,
    /// Drop the entry immediately.
    Remove,
}

/// Outcome of reconciling pending entries against authoritative rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pending entries whose effect is visible in the new rows
    pub confirmed: usize,
    /// Pending entries the server did not apply
    pub discarded: usize,
}

/// Actions accepted by the optimistic reducers.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction<R: Resource> {
    /// Locally-projected mutation
    Optimistic(OptimisticAction<R::Patch>),
    /// Authoritative rows from a refetch
    Revalidated(Vec<R>),
}

/// A rendered list: confirmed rows plus pending entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<R> {
    /// Entries in render order
    pub items: Vec<R>,
    /// Real ids of entries with an unconfirmed local edit
    pub pending_updates: BTreeSet<String>,
    /// Result of the most recent revalidation, if any
    pub last_reconcile: Option<ReconcileReport>,
}

impl<R: Resource> ListState<R> {
    /// State showing `items`.
    #[must_use]
    pub const fn new(items: Vec<R>) -> Self {
        Self {
            items,
            pending_updates: BTreeSet::new(),
            last_reconcile: None,
        }
    }

    /// Number of entries awaiting confirmation: sentinel-tagged entries plus
    /// edited ones.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.items.iter().filter(|item| is_sentinel(item.id())).count() + self.pending_updates.len()
    }

    /// Apply one optimistic action and keep `pending_updates` in step.
    pub fn apply(&mut self, action: OptimisticAction<R::Patch>, policy: DeletePolicy) {
        let target = action.data.id().filter(|id| !is_sentinel(id)).map(str::to_string);
        let kind = action.action.clone();
        if !apply_to_list(&mut self.items, action, policy) {
            return;
        }
        if let Some(id) = target {
            match kind {
                MutationKind::Update => {
                    self.pending_updates.insert(id);
                },
                MutationKind::Delete => {
                    self.pending_updates.remove(&id);
                },
                MutationKind::Create | MutationKind::Other(_) => {},
            }
        }
    }
}

impl<R> Default for ListState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending_updates: BTreeSet::new(),
            last_reconcile: None,
        }
    }
}

/// A rendered single record (a profile, a detail page).
#[derive(Debug, Clone, PartialEq)]
pub struct SingletonState<R> {
    /// The record, once loaded
    pub item: Option<R>,
    /// Real id of the record if it has an unconfirmed local edit
    pub pending_updates: BTreeSet<String>,
    /// Result of the most recent revalidation, if any
    pub last_reconcile: Option<ReconcileReport>,
}

impl<R> SingletonState<R> {
    /// State showing `item`.
    #[must_use]
    pub const fn new(item: Option<R>) -> Self {
        Self {
            item,
            pending_updates: BTreeSet::new(),
            last_reconcile: None,
        }
    }
}

impl<R: Resource> SingletonState<R> {
    /// Whether the record awaits confirmation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.pending_updates.is_empty() || self.item.as_ref().is_some_and(|item| is_sentinel(item.id()))
    }
}

impl<R> Default for SingletonState<R> {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Apply one optimistic action to a list.
///
/// - create appends `data` with id [`OPTIMISTIC_ID`]
/// - update merges the present fields of `data` into the entry whose real id
///   equals `data.id`; the entry keeps that id
/// - delete flags or removes the matching entry according to `policy`
///
/// Sentinel entries are never matched by id. Anything that matches nothing
/// leaves the list unchanged. Returns whether the list changed.
pub fn apply_to_list<R: Resource>(
    items: &mut Vec<R>,
    action: OptimisticAction<R::Patch>,
    policy: DeletePolicy,
) -> bool {
    let OptimisticAction { action, data } = action;
    match action {
        MutationKind::Create => {
            let mut record = data.into_record();
            record.set_id(OPTIMISTIC_ID.to_string());
            items.push(record);
            true
        },
        MutationKind::Update => find_real(items, data.id()).is_some_and(|entry| {
            let id = entry.id().to_string();
            data.merge_into(entry);
            entry.set_id(id);
            true
        }),
        MutationKind::Delete => match policy {
            DeletePolicy::Flag => find_real(items, data.id()).is_some_and(|entry| {
                entry.set_id(DELETE_ID.to_string());
                true
            }),
            DeletePolicy::Remove => data.id().filter(|id| !is_sentinel(id)).is_some_and(|id| {
                let before = items.len();
                items.retain(|item| item.id() != id);
                items.len() != before
            }),
        },
        MutationKind::Other(_) => false,
    }
}

fn find_real<'a, R: Resource>(items: &'a mut [R], id: Option<&str>) -> Option<&'a mut R> {
    let id = id.filter(|id| !is_sentinel(id))?;
    items.iter_mut().find(|item| item.id() == id)
}

/// Count how the pending entries of `before` fared in `rows`.
///
/// An [`OPTIMISTIC_ID`] entry is confirmed when some row has the same
/// content. A [`DELETE_ID`] entry is confirmed when no row does. An entry
/// whose id is in `updated` is confirmed when the row with that id has the
/// same content.
#[must_use]
pub fn reconcile<R: Resource>(before: &[R], updated: &BTreeSet<String>, rows: &[R]) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    for entry in before {
        let present = || rows.iter().any(|row| row.same_content(entry));
        let confirmed = match entry.id() {
            OPTIMISTIC_ID => present(),
            DELETE_ID => !present(),
            id if updated.contains(id) => rows
                .iter()
                .any(|row| row.id() == id && row.same_content(entry)),
            _ => continue,
        };
        if confirmed {
            report.confirmed += 1;
        } else {
            report.discarded += 1;
        }
    }
    report
}

/// Reducer for list views.
#[derive(Debug, Clone)]
pub struct ListReducer<R> {
    policy: DeletePolicy,
    _resource: PhantomData<fn() -> R>,
}

impl<R> ListReducer<R> {
    /// Reducer using [`DeletePolicy::Flag`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(DeletePolicy::Flag)
    }

    /// Reducer using `policy` for deletes.
    #[must_use]
    pub const fn with_policy(policy: DeletePolicy) -> Self {
        Self {
            policy,
            _resource: PhantomData,
        }
    }

    /// Delete policy in use.
    #[must_use]
    pub const fn policy(&self) -> DeletePolicy {
        self.policy
    }
}

impl<R> Default for ListReducer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Reducer for ListReducer<R> {
    type State = ListState<R>;
    type Action = ViewAction<R>;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ViewAction::Optimistic(action) => state.apply(action, self.policy),
            ViewAction::Revalidated(rows) => {
                state.last_reconcile = Some(reconcile(&state.items, &state.pending_updates, &rows));
                state.items = rows;
                state.pending_updates.clear();
            },
        }
        SmallVec::new()
    }
}

/// Reducer for singleton views.
///
/// Update and delete apply when `data.id` is absent or equals the current
/// real id.
#[derive(Debug, Clone)]
pub struct SingletonReducer<R> {
    policy: DeletePolicy,
    _resource: PhantomData<fn() -> R>,
}

impl<R> SingletonReducer<R> {
    /// Reducer using [`DeletePolicy::Flag`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(DeletePolicy::Flag)
    }

    /// Reducer using `policy` for deletes.
    #[must_use]
    pub const fn with_policy(policy: DeletePolicy) -> Self {
        Self {
            policy,
            _resource: PhantomData,
        }
    }
}

impl<R> Default for SingletonReducer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Reducer for SingletonReducer<R> {
    type State = SingletonState<R>;
    type Action = ViewAction<R>;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ViewAction::Optimistic(OptimisticAction { action, data }) => match action {
                MutationKind::Create => {
                    let mut record = data.into_record();
                    record.set_id(OPTIMISTIC_ID.to_string());
                    state.item = Some(record);
                    state.pending_updates.clear();
                },
                MutationKind::Update => {
                    if let Some(item) = targeted(&mut state.item, data.id()) {
                        let id = item.id().to_string();
                        data.merge_into(item);
                        item.set_id(id.clone());
                        state.pending_updates.insert(id);
                    }
                },
                MutationKind::Delete => {
                    if targeted(&mut state.item, data.id()).is_some() {
                        match self.policy {
                            DeletePolicy::Flag => {
                                if let Some(item) = state.item.as_mut() {
                                    item.set_id(DELETE_ID.to_string());
                                }
                            },
                            DeletePolicy::Remove => state.item = None,
                        }
                        state.pending_updates.clear();
                    }
                },
                MutationKind::Other(_) => {},
            },
            ViewAction::Revalidated(rows) => {
                let before: Vec<R> = state.item.take().into_iter().collect();
                let rows: Vec<R> = rows.into_iter().take(1).collect();
                state.last_reconcile = Some(reconcile(&before, &state.pending_updates, &rows));
                state.item = rows.into_iter().next();
                state.pending_updates.clear();
            },
        }
        SmallVec::new()
    }
}

fn targeted<'a, R: Resource>(item: &'a mut Option<R>, id: Option<&str>) -> Option<&'a mut R> {
    let item = item.as_mut().filter(|item| !is_sentinel(item.id()))?;
    match id {
        Some(id) if id != item.id() => None,
        _ => Some(item),
    }
}
