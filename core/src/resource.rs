//! Resource and patch traits.
//!
//! A [`Resource`] is one CRUD-manageable entity type (a hub, an event, a
//! review). Implementations are normally generated with
//! `#[derive(Resource)]` from `nomadhub-macros`, which also generates the
//! matching [`Patch`] type: the same fields, all optional.

use crate::schema::ValidationError;
use serde::de::{DeserializeOwned, Error as _};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Debug;

/// Name of the identifier field every resource carries.
pub const ID_FIELD: &str = "id";

/// How reads and writes of a resource are filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Reference data readable by every authenticated principal.
    Shared,
    /// Rows belong to the principal whose id is stored in `column`.
    Owned {
        /// Ownership column, e.g. `user_id`
        column: &'static str,
    },
}

/// One-level left join from a resource to its parent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    /// Parent table name
    pub table: &'static str,
    /// Foreign key column on the child table
    pub foreign_key: &'static str,
    /// Field name the parent is attached under when rendered
    pub field: &'static str,
}

/// Parent type for resources that never join.
///
/// Uninhabited, so `Option<NoParent>` is always `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoParent {}

impl Serialize for NoParent {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        match *self {}
    }
}

impl<'de> Deserialize<'de> for NoParent {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
        Err(D::Error::custom("resource has no parent join"))
    }
}

/// Partial view of a resource: every field optional.
///
/// Used as the payload of optimistic actions and as the intermediate form
/// when parsing untrusted input.
pub trait Patch<R>:
    Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The `id` carried by the patch, if any.
    fn id(&self) -> Option<&str>;

    /// Shallow-merge every present field into `target`.
    fn merge_into(&self, target: &mut R);

    /// Build a full record, defaulting absent fields.
    fn into_record(self) -> R;

    /// Patch with every field of `record` present.
    fn from_record(record: &R) -> Self;

    /// Names of the fields present in this patch.
    fn present_fields(&self) -> Vec<&'static str>;

    /// Parse untrusted JSON field by field.
    ///
    /// Server-managed fields are ignored. Every field with the wrong type is
    /// reported, not just the first.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the input is not an object or any field
    /// fails to deserialize into its declared type.
    fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError>;
}

/// A CRUD-manageable entity type.
pub trait Resource:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial form of this resource.
    type Patch: Patch<Self>;

    /// Type of the joined parent, [`NoParent`] when [`Resource::JOIN`] is `None`.
    type Parent: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Plural name, used as list key and route segment (`hubs`).
    const PLURAL: &'static str;

    /// Singular name, used as by-id key (`hub`).
    const SINGULAR: &'static str;

    /// Backing table.
    const TABLE: &'static str;

    /// Read/write scoping.
    const SCOPE: Scope;

    /// Every column, in declaration order.
    const COLUMNS: &'static [&'static str];

    /// Columns that must be present on insert and update input.
    const REQUIRED: &'static [&'static str];

    /// Server-managed columns, never accepted from input.
    const GENERATED: &'static [&'static str];

    /// Optional parent join.
    const JOIN: Option<Join>;

    /// The record's identifier.
    fn id(&self) -> &str;

    /// Replace the record's identifier.
    fn set_id(&mut self, id: String);

    /// Field equality over user-supplied fields (id and server-managed
    /// columns excluded).
    fn same_content(&self, other: &Self) -> bool;

    /// Owning principal id, for owned resources.
    fn owner(&self) -> Option<&str>;

    /// Route this resource's list is rendered under.
    #[must_use]
    fn list_path() -> String {
        format!("/{}", Self::PLURAL)
    }
}

/// A record as returned by the query layer, with its optional parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<R: Resource> {
    /// The record itself
    pub record: R,
    /// Joined parent, when the resource declares a join and the row has one
    pub parent: Option<R::Parent>,
}

impl<R: Resource> Row<R> {
    /// Row without a parent.
    #[must_use]
    pub const fn new(record: R) -> Self {
        Self {
            record,
            parent: None,
        }
    }

    /// Row with a joined parent.
    #[must_use]
    pub const fn with_parent(record: R, parent: Option<R::Parent>) -> Self {
        Self { record, parent }
    }
}

impl<R: Resource> Serialize for Row<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.record).map_err(S::Error::custom)?;
        if let (Some(join), Some(object)) = (R::JOIN, value.as_object_mut()) {
            let parent = match &self.parent {
                Some(parent) => serde_json::to_value(parent).map_err(S::Error::custom)?,
                None => serde_json::Value::Null,
            };
            object.insert(join.field.to_string(), parent);
        }
        value.serialize(serializer)
    }
}
