//! File uploads.
//!
//! `POST /api/files/upload` takes a multipart form with a `file` field,
//! checks it against an [`UploadPolicy`] and writes it through an
//! [`ObjectStorage`]. Objects are keyed `<user>/<uuid>-<name>` so callers
//! never choose where their bytes land.

use crate::error::AppError;
use crate::extractors::{Authenticated, Sessions};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Route of the upload endpoint.
pub const UPLOAD_PATH: &str = "/api/files/upload";

/// Default maximum upload size (10MB)
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Storage key, `<user>/<uuid>-<name>`
    pub path: String,
    /// Size in bytes
    pub size: usize,
    /// Declared content type
    pub content_type: String,
}

/// Failure of the storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Key would escape the storage root
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed future returned by [`ObjectStorage`].
pub type StorageFuture<'a> = Pin<Box<dyn Future<Output = Result<StoredObject, StorageError>> + Send + 'a>>;

/// Object storage backend.
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`.
    fn put<'a>(&'a self, key: &'a str, content_type: &'a str, bytes: Bytes) -> StorageFuture<'a>;
}

/// Stores objects as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    /// Storage rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !normal {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn put<'a>(&'a self, key: &'a str, content_type: &'a str, bytes: Bytes) -> StorageFuture<'a> {
        Box::pin(async move {
            let path = self.resolve(key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            tracing::debug!(key, size = bytes.len(), "Stored object");

            Ok(StoredObject {
                path: key.to_string(),
                size: bytes.len(),
                content_type: content_type.to_string(),
            })
        })
    }
}

/// Why an upload was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    /// No `file` field in the form
    #[error("No file uploaded")]
    MissingFile,

    /// The file has no content
    #[error("File is empty")]
    Empty,

    /// The file exceeds the size limit
    #[error("File exceeds the maximum size of {max_bytes} bytes")]
    TooLarge {
        /// Configured limit
        max_bytes: usize,
    },

    /// The content type is not allowed
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
}

impl From<UploadRejection> for AppError {
    fn from(rejection: UploadRejection) -> Self {
        Self::bad_request(rejection.to_string())
    }
}

/// Limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Largest accepted file, in bytes
    pub max_bytes: usize,
    /// Accepted content types
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    /// Images and PDF up to `max_bytes`.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_types: ["image/png", "image/jpeg", "image/gif", "image/webp", "application/pdf"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Check a file of `size` bytes declared as `content_type`.
    ///
    /// # Errors
    ///
    /// Returns the first [`UploadRejection`] that applies.
    pub fn check(&self, size: usize, content_type: &str) -> Result<(), UploadRejection> {
        if size == 0 {
            return Err(UploadRejection::Empty);
        }
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !self.allowed_types.iter().any(|allowed| *allowed == essence) {
            return Err(UploadRejection::UnsupportedType(content_type.to_string()));
        }
        Ok(())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else, drop leading dots.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        String::from("upload")
    } else {
        trimmed.to_string()
    }
}

/// Storage key for `file_name` uploaded by `user_id`.
#[must_use]
pub fn object_key(user_id: &str, file_name: &str) -> String {
    format!("{}/{}-{}", sanitize(user_id), uuid::Uuid::new_v4(), sanitize(file_name))
}

/// Services behind the upload route.
#[derive(Clone)]
pub struct UploadState {
    /// Where files are written
    pub storage: Arc<dyn ObjectStorage>,
    /// Size and type limits
    pub policy: UploadPolicy,
    /// Resolves the caller from request headers
    pub sessions: Sessions,
}

impl FromRef<UploadState> for Sessions {
    fn from_ref(state: &UploadState) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// The upload route, with a body limit derived from the policy.
pub fn upload_router(state: UploadState) -> Router {
    let limit = state.policy.max_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route(UPLOAD_PATH, post(upload))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

fn rejected(rejection: UploadRejection) -> AppError {
    tracing::info!(%rejection, "Upload rejected");
    metrics::counter!("uploads.rejected").increment(1);
    rejection.into()
}

fn multipart_error(error: axum::extract::multipart::MultipartError, max_bytes: usize) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return rejected(UploadRejection::TooLarge { max_bytes });
    }
    metrics::counter!("uploads.rejected").increment(1);
    AppError::bad_request("Invalid multipart body").with_source(anyhow::Error::new(error))
}

async fn upload(
    State(state): State<UploadState>,
    Authenticated(ctx): Authenticated,
    mut multipart: Multipart,
) -> Result<Json<StoredObject>, AppError> {
    let principal = ctx.require_principal()?;
    let max_bytes = state.policy.max_bytes;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;
        file = Some((file_name, content_type, bytes));
        break;
    }

    let (file_name, content_type, bytes) = file.ok_or_else(|| rejected(UploadRejection::MissingFile))?;
    state
        .policy
        .check(bytes.len(), &content_type)
        .map_err(rejected)?;

    let key = object_key(&principal.user_id, &file_name);
    let stored = state
        .storage
        .put(&key, &content_type, bytes)
        .await
        .map_err(|error| {
            tracing::error!(%error, %key, "Failed to store upload");
            AppError::internal("Failed to store file").with_source(anyhow::Error::new(error))
        })?;

    metrics::counter!("uploads.total").increment(1);
    tracing::info!(path = %stored.path, size = stored.size, "Stored upload");
    Ok(Json(stored))
}
