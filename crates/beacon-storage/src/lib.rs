//! Storage abstraction and identity for the Beacon telemetry pipeline.
//!
//! This crate provides:
//! - **KeyValueStorage**: the scoped persistence contract (`get`/`set`/`delete`)
//! - **MemoryStorage**, **FileStorage**, **ScopedStorage**: backends
//! - **IdentityStore**: session id creation/restoration and user id lookup

mod file;
mod identity;
mod keys;
mod memory;
mod scoped;
mod traits;

pub use file::FileStorage;
pub use identity::{IdentityStore, SessionOrigin, SESSION_ID_PREFIX};
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use scoped::ScopedStorage;
pub use traits::KeyValueStorage;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored data has an unexpected shape
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a file-backed identity store, scoped to `scope`.
pub fn create_identity_store(path: &Path, scope: &str) -> IdentityStore {
    let file: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(path));
    IdentityStore::new(Arc::new(ScopedStorage::new(scope, file)))
}

/// Create an identity store that lives only in memory.
pub fn create_memory_identity_store() -> IdentityStore {
    IdentityStore::new(Arc::new(MemoryStorage::new()))
}
