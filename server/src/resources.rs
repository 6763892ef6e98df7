//! Domain resources.
//!
//! Reference data (regions, states, hubs) is shared by everyone. Everything
//! a nomad creates is owned by `user_id`, which is never accepted from input.
//!
//! ```text
//! Region ◀── RegionalState
//!   ▲
//!   └── Hub ◀── Event, Review, Community
//!
//! VisaApplication ◀── Proof
//! Chat
//! ```

use chrono::{DateTime, Utc};
use nomadhub_core::schema::{Issues, Validate};
use nomadhub_macros::Resource;
use serde::{Deserialize, Serialize};

/// Statuses a visa application moves through.
pub const VISA_STATUSES: &[&str] = &["draft", "submitted", "in_review", "approved", "rejected"];

/// Two uppercase ASCII letters, the ISO 3166-1 alpha-2 shape.
fn is_country_code(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_uppercase())
}

/// `http(s)://` followed by a non-empty host and no whitespace.
fn is_web_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    rest.is_some_and(|rest| {
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        !host.is_empty() && !value.chars().any(char::is_whitespace)
    })
}

fn country_code(issues: &mut Issues, field: &str, value: &str) {
    if !is_country_code(value) {
        issues.push(field, format!("{field} must be an ISO 3166-1 alpha-2 code"));
    }
}

fn web_url(issues: &mut Issues, field: &str, value: &str) {
    if !is_web_url(value) {
        issues.push(field, format!("{field} must be an http(s) URL"));
    }
}

/// Geographic region.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "regions")]
pub struct Region {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Free text
    pub description: Option<String>,
}

impl Validate for Region {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
        issues.max_len("name", &self.name, 120);
    }
}

/// Country within a region.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "states", singular = "state", parent = Region, foreign_key = "region_id")]
pub struct RegionalState {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// ISO 3166-1 alpha-2 code
    pub country_code: String,
    /// Owning region
    pub region_id: String,
}

impl Validate for RegionalState {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
        country_code(issues, "country_code", &self.country_code);
        issues.uuid("region_id", &self.region_id);
    }
}

/// Coworking or coliving hub.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "hubs", parent = Region, foreign_key = "region_id")]
pub struct Hub {
    /// Identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// City the hub is in
    pub city: String,
    /// ISO 3166-1 alpha-2 code
    pub country_code: String,
    /// Owning region
    pub region_id: String,
    /// Free text
    pub description: Option<String>,
    /// Public website
    pub website: Option<String>,
}

impl Validate for Hub {
    fn validate(&self, issues: &mut Issues) {
        issues.non_empty("name", &self.name);
        issues.non_empty("city", &self.city);
        country_code(issues, "country_code", &self.country_code);
        issues.uuid("region_id", &self.region_id);
        if let Some(website) = &self.website {
            web_url(issues, "website", website);
        }
    }
}

/// Meetup hosted at a hub.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "events", owner = "user_id", parent = Hub, foreign_key = "hub_id")]
pub struct Event {
    /// Identifier
    pub id: String,
    /// Host hub
    pub hub_id: String,
    /// Title
    pub title: String,
    /// Free text
    pub description: Option<String>,
    /// Start time
    pub starts_at: DateTime<Utc>,
    /// End time, after `starts_at`
    pub ends_at: DateTime<Utc>,
    /// Organizer
    pub user_id: String,
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for Event {
    fn validate(&self, issues: &mut Issues) {
        issues.uuid("hub_id", &self.hub_id);
        issues.non_empty("title", &self.title);
        if self.ends_at <= self.starts_at {
            issues.push("ends_at", "ends_at must be after starts_at");
        }
    }
}

/// A nomad's visa application.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "visa_applications", owner = "user_id")]
pub struct VisaApplication {
    /// Identifier
    pub id: String,
    /// Destination country, ISO 3166-1 alpha-2
    pub country_code: String,
    /// Visa category, e.g. "digital nomad"
    pub visa_type: String,
    /// One of [`VISA_STATUSES`]
    pub status: String,
    /// Free text
    pub notes: Option<String>,
    /// Applicant
    pub user_id: String,
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for VisaApplication {
    fn validate(&self, issues: &mut Issues) {
        country_code(issues, "country_code", &self.country_code);
        issues.non_empty("visa_type", &self.visa_type);
        issues.one_of("status", &self.status, VISA_STATUSES);
    }
}

/// Supporting document for a visa application.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(
    plural = "proofs",
    owner = "user_id",
    parent = VisaApplication,
    foreign_key = "visa_application_id"
)]
pub struct Proof {
    /// Identifier
    pub id: String,
    /// Application this proof supports
    pub visa_application_id: String,
    /// What the document is
    pub title: String,
    /// Where the document is stored
    pub url: String,
    /// Uploader
    pub user_id: String,
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for Proof {
    fn validate(&self, issues: &mut Issues) {
        issues.uuid("visa_application_id", &self.visa_application_id);
        issues.non_empty("title", &self.title);
        web_url(issues, "url", &self.url);
    }
}

/// Rating of a hub.
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
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
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

/// Group of nomads around a hub.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "communities", owner = "user_id", parent = Hub, foreign_key = "hub_id")]
pub struct Community {
    /// Identifier
    pub id: String,
    /// Home hub
    pub hub_id: String,
    /// Display name
    pub name: String,
    /// Free text
    pub description: Option<String>,
    /// Founder
    pub user_id: String,
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for Community {
    fn validate(&self, issues: &mut Issues) {
        issues.uuid("hub_id", &self.hub_id);
        issues.non_empty("name", &self.name);
    }
}

/// Assistant conversation.
#[derive(Resource, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[resource(plural = "chats", owner = "user_id")]
pub struct Chat {
    /// Identifier
    pub id: String,
    /// Title shown in the sidebar
    pub title: String,
    /// Participant
    pub user_id: String,
    /// Set by the database
    #[resource(generated)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for Chat {
    fn validate(&self, issues: &mut Issues) {
        issues.max_len("title", &self.title, 200);
    }
}
