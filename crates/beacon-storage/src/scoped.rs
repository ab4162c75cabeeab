//! Key scoping over any storage backend.

use crate::{KeyValueStorage, StorageResult};
use std::sync::Arc;

/// Prefixes every key with `<scope>:` so several tenants can share a backend.
pub struct ScopedStorage {
    scope: String,
    inner: Arc<dyn KeyValueStorage>,
}

impl ScopedStorage {
    pub fn new(scope: impl Into<String>, inner: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            scope: scope.into(),
            inner,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }
}

impl KeyValueStorage for ScopedStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(&self.scoped_key(key), value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(&self.scoped_key(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.scoped_key(key))
    }
}
