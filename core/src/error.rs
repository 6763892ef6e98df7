//! User-facing action errors.
//!
//! Actions never throw to their caller. Every failure is one of two kinds and
//! is rendered to a short string with [`ActionError::user_message`]:
//!
//! | failure | message |
//! |---|---|
//! | validation | first issue's message |
//! | operation with a non-empty message | that message |
//! | structured `{ "error": "..." }` with a non-empty `error` | that field |
//! | anything else | [`DEFAULT_ERROR_MESSAGE`] |

use crate::context::Unauthorized;
use crate::repository::PersistenceError;
use crate::schema::ValidationError;
use thiserror::Error;

/// Message shown when a failure carries nothing usable.
pub const DEFAULT_ERROR_MESSAGE: &str = "Error, please try again.";

/// Failure of a server action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Input did not match the resource schema
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Authorization, persistence or any other operational failure
    #[error("{0}")]
    Operation(OperationError),
}

/// Kind of an operational failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    /// The caller has no session
    Unauthorized,
    /// Persistence or any other failure
    #[default]
    Failed,
}

/// An operational failure and the message shown for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    /// What went wrong
    pub kind: OperationKind,
    /// Message shown to the user, may be empty
    pub message: String,
}

impl ActionError {
    /// Operational failure with `message`.
    #[must_use]
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(OperationError {
            kind: OperationKind::Failed,
            message: message.into(),
        })
    }

    /// Normalize a structured failure value.
    ///
    /// Objects with a string `error` field surface that field; anything
    /// else collapses to the default message.
    #[must_use]
    pub fn from_structured(value: &serde_json::Value) -> Self {
        let message = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        Self::operation(message)
    }

    /// Whether this is a validation failure.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the action was refused for lack of a session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Operation(OperationError {
                kind: OperationKind::Unauthorized,
                ..
            })
        )
    }

    /// Short string for display next to the form that triggered the action.
    #[must_use]
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Validation(error) => error.first_message(),
            Self::Operation(error) => error.message.as_str(),
        };
        if message.is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message.to_string()
        }
    }
}

impl From<Unauthorized> for ActionError {
    fn from(err: Unauthorized) -> Self {
        Self::Operation(OperationError {
            kind: OperationKind::Unauthorized,
            message: err.to_string(),
        })
    }
}

impl From<PersistenceError> for ActionError {
    fn from(err: PersistenceError) -> Self {
        Self::operation(err.to_string())
    }
}
