//! Input validation against resource schemas.
//!
//! Server actions never trust their payload, including the one the client
//! just used for its optimistic projection. Every insert and update is parsed
//! from raw JSON here:
//!
//! 1. field-by-field type checking via [`Patch::from_json`]
//! 2. required-field checks from [`Resource::REQUIRED`]
//! 3. resource-specific rules from [`Validate`]
//!
//! All issues found in a stage are reported together.

use crate::resource::{Patch, Resource, ID_FIELD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field name (empty for whole-payload issues)
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Validation failure listing every offending field.
///
/// Displays as the first issue's message, which is what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.first_message())]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Error with a single issue.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// All issues, in discovery order.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Names of the offending fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    /// Message of the first issue.
    #[must_use]
    pub fn first_message(&self) -> &str {
        self.issues
            .first()
            .map_or("Invalid input", |issue| issue.message.as_str())
    }
}

/// Issue accumulator used while validating.
#[derive(Debug, Default)]
pub struct Issues(Vec<FieldIssue>);

impl Issues {
    /// Record an issue.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok` when empty, otherwise every recorded issue.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if any issue was recorded.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues: self.0 })
        }
    }

    /// Require a non-blank string.
    pub fn non_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, format!("{field} cannot be empty"));
        }
    }

    /// Require a string of at most `max` characters.
    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("{field} must be at most {max} characters"));
        }
    }

    /// Require `min <= value <= max`.
    pub fn in_range<T: PartialOrd + std::fmt::Display>(&mut self, field: &str, value: &T, min: T, max: T) {
        if *value < min || *value > max {
            self.push(field, format!("{field} must be between {min} and {max}"));
        }
    }

    /// Require `value` to be one of `allowed`.
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.push(
                field,
                format!("{field} must be one of: {}", allowed.join(", ")),
            );
        }
    }

    /// Require a UUID-shaped identifier (foreign keys).
    pub fn uuid(&mut self, field: &str, value: &str) {
        if !is_uuid(value) {
            self.push(field, format!("{field} must be a valid id"));
        }
    }
}

/// Resource-specific validation rules, run after type and presence checks.
pub trait Validate {
    /// Record any rule violations.
    fn validate(&self, _issues: &mut Issues) {}
}

/// Parse an insert payload.
///
/// Any `id` in the payload is dropped; the persistence layer assigns one.
///
/// # Errors
///
/// Returns [`ValidationError`] on type errors, missing required fields, or
/// rule violations.
pub fn parse_insert<R>(input: &serde_json::Value) -> Result<R, ValidationError>
where
    R: Resource + Validate,
{
    let patch = R::Patch::from_json(input)?;
    require_fields::<R>(&patch, false)?;

    let mut record = patch.into_record();
    record.set_id(String::new());
    check_rules(&record)?;
    Ok(record)
}

/// Parse an update payload: the full record including its `id`.
///
/// # Errors
///
/// Returns [`ValidationError`] on type errors, missing `id` or required
/// fields, or rule violations.
pub fn parse_update<R>(input: &serde_json::Value) -> Result<R, ValidationError>
where
    R: Resource + Validate,
{
    let patch = R::Patch::from_json(input)?;
    require_fields::<R>(&patch, true)?;

    let record = patch.into_record();
    check_rules(&record)?;
    Ok(record)
}

/// Parse a delete payload: only the `id` is required.
///
/// # Errors
///
/// Returns [`ValidationError`] if `id` is missing or not a string.
pub fn parse_id(input: &serde_json::Value) -> Result<String, ValidationError> {
    match input.get(ID_FIELD) {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(serde_json::Value::String(_)) | None | Some(serde_json::Value::Null) => {
            Err(ValidationError::single(ID_FIELD, "id is required"))
        },
        Some(_) => Err(ValidationError::single(ID_FIELD, "Invalid id: expected a string")),
    }
}

fn require_fields<R: Resource>(patch: &R::Patch, with_id: bool) -> Result<(), ValidationError> {
    let present = patch.present_fields();
    let mut issues = Issues::default();

    if with_id && patch.id().is_none_or(|id| id.trim().is_empty()) {
        issues.push(ID_FIELD, "id is required");
    }
    for field in R::REQUIRED {
        if !present.contains(field) {
            issues.push(*field, format!("{field} is required"));
        }
    }
    issues.into_result()
}

fn check_rules<R: Validate>(record: &R) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    record.validate(&mut issues);
    issues.into_result()
}

/// Canonical 8-4-4-4-12 hex UUID check.
///
/// Simple, braced and urn forms are rejected.
#[must_use]
pub fn is_uuid(value: &str) -> bool {
    value.len() == HYPHENATED_LEN && Uuid::try_parse(value).is_ok()
}

const HYPHENATED_LEN: usize = 36;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::{Hub, Region, REGION_ID};
    use serde_json::json;

    #[test]
    fn insert_drops_client_id() {
        let region: Region = parse_insert(&json!({ "id": "optimistic", "name": "Andes" })).unwrap();
        assert_eq!(region.id, "");
        assert_eq!(region.name, "Andes");
    }

    #[test]
    fn insert_reports_every_missing_field() {
        let err = parse_insert::<Hub>(&json!({})).unwrap_err();
        assert_eq!(err.fields(), vec!["name", "region_id"]);
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn insert_reports_type_errors_per_field() {
        let err = parse_insert::<Hub>(&json!({ "name": 12, "region_id": false })).unwrap_err();
        assert_eq!(err.fields(), vec!["name", "region_id"]);
        assert!(err.first_message().starts_with("Invalid name"));
    }

    #[test]
    fn insert_runs_resource_rules() {
        let err = parse_insert::<Hub>(&json!({ "name": "  ", "region_id": "nope" })).unwrap_err();
        assert_eq!(err.fields(), vec!["name", "region_id"]);
    }

    #[test]
    fn insert_ignores_server_managed_fields() {
        let hub: Hub = parse_insert(&json!({
            "name": "Medellin",
            "region_id": REGION_ID,
            "user_id": "someone-else"
        }))
        .unwrap();
        assert_eq!(hub.user_id, "");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = parse_insert::<Region>(&json!(["name"])).unwrap_err();
        assert_eq!(err.fields(), vec![""]);
    }

    #[test]
    fn update_requires_id() {
        let err = parse_update::<Region>(&json!({ "name": "Andes" })).unwrap_err();
        assert_eq!(err.fields(), vec!["id"]);

        let region: Region = parse_update(&json!({ "id": "r1", "name": "Andes" })).unwrap();
        assert_eq!(region.id, "r1");
    }

    #[test]
    fn parse_id_requires_non_blank_string() {
        assert_eq!(parse_id(&json!({ "id": "r1" })).unwrap(), "r1");
        assert_eq!(parse_id(&json!({ "id": " " })).unwrap_err().fields(), vec!["id"]);
        assert_eq!(parse_id(&json!({})).unwrap_err().fields(), vec!["id"]);
        assert!(parse_id(&json!({ "id": 4 })).unwrap_err().first_message().contains("string"));
    }

    #[test]
    fn uuid_shape() {
        assert!(is_uuid("6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2c"));
        assert!(!is_uuid("6f1b2a3c0d4e4f5a8b6c7d8e9f0a1b2c"));
        assert!(!is_uuid("6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2z"));
        assert!(!is_uuid("{6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2c}"));
        assert!(!is_uuid("urn:uuid:6f1b2a3c-0d4e-4f5a-8b6c-7d8e9f0a1b2c"));
        assert!(!is_uuid("6f1b2a3c-0d4e4-f5a-8b6c-7d8e9f0a1b2c"));
    }

    #[test]
    fn issue_helpers() {
        let mut issues = Issues::default();
        issues.max_len("name", "abcdef", 3);
        issues.in_range("rating", &7, 1, 5);
        issues.one_of("status", "lost", &["draft", "submitted"]);
        let err = issues.into_result().unwrap_err();
        assert_eq!(err.fields(), vec!["name", "rating", "status"]);
        assert_eq!(err.issues()[1].message, "rating must be between 1 and 5");
    }
}
