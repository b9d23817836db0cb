use std::ops::Deref;
use std::sync::Arc;

use super::Storage;
use crate::error::StorageResult;

/// End-of-view hook run when a [`Snapshot`] drops.
pub struct Snapshot<'a> {
    release: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> Snapshot<'a> {
    pub fn new(release: impl FnOnce() + 'a) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A view with no isolation; reads see whatever is current.
    pub fn detached() -> Self {
        Self { release: None }
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// One unit of work over a storage backend. Shutdown runs exactly once: via
/// [`StorageScope::close`], or on drop when an error path skipped it.
pub struct StorageScope {
    storage: Arc<dyn Storage>,
    closed: bool,
}

impl StorageScope {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            closed: false,
        }
    }

    pub fn close(mut self) -> StorageResult<()> {
        self.closed = true;
        self.storage.shutdown()
    }
}

impl Deref for StorageScope {
    type Target = dyn Storage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

impl Drop for StorageScope {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.storage.shutdown() {
            log::warn!("storage shutdown failed: {}", err);
        }
    }
}
