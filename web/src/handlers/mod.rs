//! HTTP request handlers.

pub mod chats;
pub mod health;
pub mod resources;
pub mod revalidations;
pub mod uploads;

pub use chats::chat_router;
pub use health::{health_check, health_router, ReadinessProbe};
pub use resources::{resource_router, ResourceState, Single};
pub use revalidations::{revalidation_router, RevalidationState};
pub use uploads::{
    upload_router, LocalObjectStorage, ObjectStorage, StorageError, StoredObject, UploadPolicy, UploadState,
};
