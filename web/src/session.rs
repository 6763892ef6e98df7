//! Session resolution.
//!
//! The platform does not own authentication. A [`SessionResolver`] turns the
//! request headers into a [`Principal`], either by trusting a header set by
//! an upstream auth proxy or by looking up a bearer token from configuration.

use axum::http::{header, HeaderMap, HeaderName};
use nomadhub_core::context::Principal;
use std::collections::HashMap;
use thiserror::Error;

/// Header carrying the user id when an auth proxy sits in front.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Maps request headers to the caller.
pub trait SessionResolver: Send + Sync {
    /// The caller, or `None` when the request carries no valid session.
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Trusts a header set by an upstream proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeaderResolver {
    header: HeaderName,
}

impl TrustedHeaderResolver {
    /// Resolver reading [`USER_ID_HEADER`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: HeaderName::from_static(USER_ID_HEADER),
        }
    }

    /// Resolver reading `header`.
    #[must_use]
    pub const fn with_header(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for TrustedHeaderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionResolver for TrustedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(Principal::new)
    }
}

/// Invalid `AUTH_TOKENS` entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid token entry '{0}': expected token:user_id")]
pub struct TokenParseError(pub String);

/// Bearer tokens issued out of band, mapped to user ids.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    /// Resolver for `(token, user_id)` pairs.
    #[must_use]
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Parse `token:user_id` entries separated by commas.
    ///
    /// # Errors
    ///
    /// Returns [`TokenParseError`] for an entry without both parts.
    pub fn parse(pairs: &str) -> Result<Self, TokenParseError> {
        let mut tokens = HashMap::new();
        for entry in pairs.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            match entry.split_once(':') {
                Some((token, user_id)) if !token.trim().is_empty() && !user_id.trim().is_empty() => {
                    tokens.insert(token.trim().to_string(), user_id.trim().to_string());
                },
                _ => return Err(TokenParseError(entry.to_string())),
            }
        }
        Ok(Self { tokens })
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl SessionResolver for StaticTokenResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers)?;
        self.tokens.get(token).map(Principal::new)
    }
}
