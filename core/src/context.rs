//! Request context and principal.
//!
//! Session state is never ambient: every query and action receives the
//! caller's [`RequestContext`] explicitly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user id, matched against ownership columns
    pub user_id: String,
}

impl Principal {
    /// Principal for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// No principal was attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unauthorized")]
pub struct Unauthorized;

/// Per-request context passed into every query and action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    principal: Option<Principal>,
    correlation_id: Option<String>,
}

impl RequestContext {
    /// Context without a session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            principal: None,
            correlation_id: None,
        }
    }

    /// Context for an authenticated principal.
    #[must_use]
    pub const fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            correlation_id: None,
        }
    }

    /// Attach a correlation id for log correlation.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// The caller, if authenticated.
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Correlation id, if one was attached.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// The caller, or [`Unauthorized`].
    ///
    /// # Errors
    ///
    /// Returns [`Unauthorized`] when the context carries no principal.
    pub const fn require_principal(&self) -> Result<&Principal, Unauthorized> {
        match &self.principal {
            Some(principal) => Ok(principal),
            None => Err(Unauthorized),
        }
    }
}
