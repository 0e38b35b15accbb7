//! Device telemetry and the do-not-disturb command.

use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;

/// Payload of a `StatusUpdate` frame. Missing fields decode to their
/// zero values so older peers stay compatible.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusReport {
    /// Battery percentage (0–100).
    pub battery: i32,
    pub charging: bool,
    /// Whether do-not-disturb is active.
    pub dnd: bool,
    /// Network identifier (e.g. SSID) or a short state label.
    pub wifi: String,
}

impl StatusReport {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TetherError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TetherError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn into_frame(self) -> Result<Frame, TetherError> {
        Frame::new(MessageType::StatusUpdate, self.to_bytes()?)
    }
}

/// Parse a `SetDnd` payload. Only a case-insensitive `true` enables DND;
/// anything else disables it.
pub fn parse_dnd(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        let status = StatusReport {
            battery: 87,
            charging: true,
            dnd: false,
            wifi: "home-5g".into(),
        };
        let decoded = StatusReport::from_bytes(&status.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn missing_fields_default() {
        let status = StatusReport::from_bytes(br#"{"battery": 40}"#).unwrap();
        assert_eq!(status.battery, 40);
        assert!(!status.charging);
        assert!(!status.dnd);
        assert_eq!(status.wifi, "");
    }

    #[test]
    fn dnd_parsing() {
        assert!(parse_dnd(b"true"));
        assert!(parse_dnd(b"TRUE"));
        assert!(!parse_dnd(b"false"));
        assert!(!parse_dnd(b"yes"));
        assert!(!parse_dnd(&[0xFF, 0xFE]));
    }
}
