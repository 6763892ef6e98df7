//! Small resources for tests.
//!
//! - [`Region`]: shared reference data
//! - [`Hub`]: shared, joined to its region
//! - [`Review`]: owned by `user_id`, joined to its hub, rating 1–5

use nomadhub_core::schema::{Issues, Validate};
use nomadhub_macros::Resource;
use serde::{Deserialize, Serialize};

/// A well-formed region id.
pub const REGION_ID: &str = "6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2c";

/// A well-formed hub id.
pub const HUB_ID: &str = "0a6e2f4b-9c1d-4e7a-b3f5-2d8c6a1e9b70";

/// Shared geographic region.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "regions")]
pub struct Region {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl Region {
    /// Region with `id` and `name`.
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

impl Validate for Region {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
    }
}

/// Coworking hub inside a region.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "hubs", parent = Region, foreign_key = "region_id")]
pub struct Hub {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Owning region
    pub region_id: String,
}

impl Hub {
    /// Hub with `id` and `name` in `region_id`.
    #[must_use]
    pub fn new(id: &str, name: &str, region_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            region_id: region_id.to_string(),
        }
    }
}

impl Validate for Hub {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
        issues.uuid("region_id", &self.region_id);
    }
}

/// A user's review of a hub.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "reviews", owner = "user_id", parent = Hub, foreign_key = "hub_id")]
pub struct Review {
    /// Identifier
    pub id: String,
    /// Reviewed hub
    pub hub_id: String,
    /// Stars, 1 to 5
    pub rating: i32,
    /// Free text
    pub comment: Option<String>,
    /// Author
    pub user_id: String,
}

impl Review {
    /// Review of `hub_id` with `rating`, unowned until stored.
    #[must_use]
    pub fn new(id: &str, hub_id: &str, rating: i32) -> Self {
        Self {
            id: id.to_string(),
            hub_id: hub_id.to_string(),
            rating,
            ..Self::default()
        }
    }

    /// Set the author.
    #[must_use]
    pub fn by(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }
}

impl Validate for Review {
    fn validate(&self, issues: &mut Issues) {
        issues.uuid("hub_id", &self.hub_id);
        issues.in_range("rating", &self.rating, 1, 5);
        if let Some(comment) = &self.comment {
            issues.max_len("comment", comment, 2000);
        }
    }
}
