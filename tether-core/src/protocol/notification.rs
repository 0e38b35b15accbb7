//! Mirrored notification records and the outbound mirroring policy.
//!
//! ```text
//! Hub ──[NotificationPosted]──► Satellite   {"package","title","text","key"}
//! Hub ──[NotificationRemoved]─► Satellite   key (UTF-8)
//! Satellite ──[RequestDismiss]─► Hub        key (UTF-8)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;

/// Title shown when the origin supplied none.
pub const DEFAULT_TITLE: &str = "Notification";

/// The flat record carried by a `NotificationPosted` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationRecord {
    pub package: String,
    pub title: String,
    pub text: String,
    /// Opaque origin-side key used to correlate removal and dismissal.
    pub key: String,
}

impl Default for NotificationRecord {
    fn default() -> Self {
        Self {
            package: String::new(),
            title: DEFAULT_TITLE.into(),
            text: String::new(),
            key: String::new(),
        }
    }
}

impl NotificationRecord {
    pub fn new(
        package: impl Into<String>,
        key: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            title: title.into(),
            text: text.into(),
            key: key.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TetherError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TetherError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Build a `NotificationPosted` frame.
    pub fn into_frame(self) -> Result<Frame, TetherError> {
        Frame::new(MessageType::NotificationPosted, self.to_bytes()?)
    }
}

/// A notification as seen at its origin, before it is mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNotification {
    pub record: NotificationRecord,
    /// Ongoing (persistent) notifications are never mirrored.
    pub ongoing: bool,
}

/// Decides which origin notifications are mirrored to the peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MirrorPolicy {
    /// Enables mirroring at all.
    pub enabled: bool,
    /// When set, only these packages are mirrored.
    pub allowed_packages: Option<BTreeSet<String>>,
    /// The hub's own package; its notifications are never mirrored.
    pub own_package: String,
}

impl Default for MirrorPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_packages: None,
            own_package: String::new(),
        }
    }
}

impl MirrorPolicy {
    pub fn admits(&self, notification: &SourceNotification) -> bool {
        let record = &notification.record;
        if !self.enabled || notification.ongoing {
            return false;
        }
        if let Some(allowed) = &self.allowed_packages {
            if !allowed.contains(&record.package) {
                return false;
            }
        }
        if !self.own_package.is_empty() && record.package == self.own_package {
            return false;
        }
        !(record.title.is_empty() && record.text.is_empty())
    }

    /// Whether removals should be forwarded at all.
    pub fn forwards_removals(&self) -> bool {
        self.enabled
    }
}
