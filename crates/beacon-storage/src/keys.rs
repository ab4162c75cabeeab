//! Storage key constants.

/// Storage keys used by the pipeline
pub struct StorageKeys;

impl StorageKeys {
    /// Active session identifier
    pub const SESSION_ID: &'static str = "session_id";

    /// Authenticated user identifier (written by the auth collaborator)
    pub const USER_ID: &'static str = "user_id";
}
