//! Receiver-side notification mirror.
//!
//! Maps each origin key to a stable local display handle so that a repost
//! of the same key replaces the existing entry instead of adding a new one,
//! and so that removal and dismissal can find it again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::collab::NotificationPresenter;
use crate::error::TetherError;
use crate::protocol::NotificationRecord;

/// First handle handed out; keeps clear of handles the host UI reserves.
pub const FIRST_HANDLE: u32 = 1000;

#[derive(Debug)]
struct Handles {
    by_key: HashMap<String, u32>,
    next: u32,
}

#[derive(Debug)]
pub struct NotificationRelay {
    handles: Mutex<Handles>,
}

impl Default for NotificationRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRelay {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Handles {
                by_key: HashMap::new(),
                next: FIRST_HANDLE,
            }),
        }
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle for `key`, allocating one on first sight. The flag is `true`
    /// when the handle is new.
    fn handle_for(&self, key: &str) -> (u32, bool) {
        let mut handles = self.handles();
        if let Some(&h) = handles.by_key.get(key) {
            return (h, false);
        }
        let h = handles.next;
        handles.next = handles.next.wrapping_add(1).max(FIRST_HANDLE);
        handles.by_key.insert(key.to_string(), h);
        (h, true)
    }

    pub fn lookup(&self, key: &str) -> Option<u32> {
        self.handles().by_key.get(key).copied()
    }

    /// Drop the mapping for `key`, returning its handle.
    pub fn evict(&self, key: &str) -> Option<u32> {
        self.handles().by_key.remove(key)
    }

    pub fn len(&self) -> usize {
        self.handles().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render (or re-render) `record` under its key's handle.
    pub fn show(
        &self,
        record: &NotificationRecord,
        presenter: &dyn NotificationPresenter,
    ) -> Result<u32, TetherError> {
        let (handle, fresh) = self.handle_for(&record.key);
        if let Err(e) = presenter.render(handle, record) {
            if fresh {
                self.evict(&record.key);
            }
            return Err(e);
        }
        debug!(key = %record.key, handle, "notification shown");
        Ok(handle)
    }

    /// Withdraw the entry for `key`. Unknown keys are a no-op.
    pub fn withdraw(&self, key: &str, presenter: &dyn NotificationPresenter) -> Option<u32> {
        match self.evict(key) {
            Some(handle) => {
                presenter.withdraw(handle);
                debug!(key, handle, "notification withdrawn");
                Some(handle)
            }
            None => {
                debug!(key, "withdraw for unknown key ignored");
                None
            }
        }
    }

    /// Forget every mapping (e.g. on presenter reset).
    pub fn clear(&self) {
        self.handles().by_key.clear();
    }
}
