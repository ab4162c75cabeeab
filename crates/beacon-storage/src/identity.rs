//! Session and user identity for event stamping.
//!
//! The session id is resolved once per context (storage read, or generate and
//! write) and then served from memory. The user id is read once and then kept
//! in memory; [`IdentityStore::refresh_user_id`] picks up writes made by other
//! processes. Storage failures never escape: the store falls back to an
//! ephemeral in-memory session id and logs a warning.

use crate::{KeyValueStorage, StorageKeys};
use beacon_config_and_utils::generate_id;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of generated session ids.
pub const SESSION_ID_PREFIX: &str = "sess";

/// Where the current session id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Read back from persistent storage.
    Restored,
    /// Generated and persisted in this context.
    Created,
    /// Generated after a storage failure; lives only in memory.
    Ephemeral,
}

#[derive(Debug, Clone)]
struct ResolvedSession {
    id: String,
    origin: SessionOrigin,
}

/// Resolves session and user identity over a key-value store.
pub struct IdentityStore {
    storage: Arc<dyn KeyValueStorage>,
    session: Mutex<Option<ResolvedSession>>,
    /// `None` until the first read.
    user: Mutex<Option<Option<String>>>,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            session: Mutex::new(None),
            user: Mutex::new(None),
        }
    }

    /// Return the session id for this context, creating and persisting one
    /// if storage has none.
    pub fn get_or_create_session_id(&self) -> String {
        let mut session = self.session.lock();
        if let Some(resolved) = session.as_ref() {
            return resolved.id.clone();
        }

        let resolved = self.resolve_session();
        let id = resolved.id.clone();
        *session = Some(resolved);
        id
    }

    /// Origin of the cached session, if one has been resolved yet.
    pub fn session_origin(&self) -> Option<SessionOrigin> {
        self.session.lock().as_ref().map(|s| s.origin)
    }

    fn resolve_session(&self) -> ResolvedSession {
        match self.storage.get(StorageKeys::SESSION_ID) {
            Ok(Some(id)) if !id.trim().is_empty() => {
                debug!(session_id = %id, "Restored session id");
                return ResolvedSession {
                    id,
                    origin: SessionOrigin::Restored,
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Session storage read failed, using ephemeral session id");
                return ResolvedSession {
                    id: generate_id(SESSION_ID_PREFIX),
                    origin: SessionOrigin::Ephemeral,
                };
            }
        }

        let id = generate_id(SESSION_ID_PREFIX);
        match self.storage.set(StorageKeys::SESSION_ID, &id) {
            Ok(()) => {
                info!(session_id = %id, "Created session");
                ResolvedSession {
                    id,
                    origin: SessionOrigin::Created,
                }
            }
            Err(e) => {
                warn!(
                    session_id = %id,
                    error = %e,
                    "Session storage write failed, session id is ephemeral"
                );
                ResolvedSession {
                    id,
                    origin: SessionOrigin::Ephemeral,
                }
            }
        }
    }

    /// User id set by the authentication collaborator.
    ///
    /// Storage is read on the first call only.
    pub fn get_user_id(&self) -> Option<String> {
        let mut user = self.user.lock();
        if let Some(cached) = user.as_ref() {
            return cached.clone();
        }

        let user_id = self.read_user_id();
        *user = Some(user_id.clone());
        user_id
    }

    /// Re-read the user id from storage, replacing the cached value.
    pub fn refresh_user_id(&self) -> Option<String> {
        let user_id = self.read_user_id();
        *self.user.lock() = Some(user_id.clone());
        user_id
    }

    fn read_user_id(&self) -> Option<String> {
        match self.storage.get(StorageKeys::USER_ID) {
            Ok(user_id) => user_id.filter(|id| !id.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "User id storage read failed");
                None
            }
        }
    }

    /// Record the authenticated user. Returns false if storage rejected it,
    /// in which case the cached user id is left as it was.
    pub fn set_user_id(&self, user_id: &str) -> bool {
        let mut user = self.user.lock();
        match self.storage.set(StorageKeys::USER_ID, user_id) {
            Ok(()) => {
                *user = Some(Some(user_id.to_string()));
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to store user id");
                false
            }
        }
    }

    /// Forget the authenticated user.
    pub fn clear_user_id(&self) {
        let mut user = self.user.lock();
        *user = Some(None);
        if let Err(e) = self.storage.delete(StorageKeys::USER_ID) {
            warn!(error = %e, "Failed to clear user id");
        }
    }

    /// Drop the current session; the next call creates a new one.
    pub fn reset_session(&self) {
        let mut session = self.session.lock();
        *session = None;
        if let Err(e) = self.storage.delete(StorageKeys::SESSION_ID) {
            warn!(error = %e, "Failed to delete stored session id");
        }
        info!("Session reset");
    }
}
