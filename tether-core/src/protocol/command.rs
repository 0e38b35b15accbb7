//! The `TextCommand` escape hatch.
//!
//! One frame type multiplexes string requests and responses so new
//! requests can be added without touching the wire format.

use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;

pub const CMD_REQUEST_APPS: &str = "CMD_REQUEST_APPS";
pub const CMD_RESPONSE_APPS: &str = "CMD_RESPONSE_APPS:";

/// A parsed `TextCommand` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    /// Ask the peer for its launchable application list.
    RequestApps,
    /// JSON array of [`AppEntry`] answering `RequestApps`.
    AppList(String),
    /// Anything this build does not understand.
    Unknown(String),
}

impl TextCommand {
    pub fn parse(text: &str) -> Self {
        if text == CMD_REQUEST_APPS {
            Self::RequestApps
        } else if let Some(json) = text.strip_prefix(CMD_RESPONSE_APPS) {
            Self::AppList(json.to_string())
        } else {
            Self::Unknown(text.to_string())
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::RequestApps => CMD_REQUEST_APPS.to_string(),
            Self::AppList(json) => format!("{CMD_RESPONSE_APPS}{json}"),
            Self::Unknown(text) => text.clone(),
        }
    }

    pub fn into_frame(self) -> Result<Frame, TetherError> {
        Frame::text(MessageType::TextCommand, self.encode())
    }
}

/// One installed application, as listed in an app-list response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppEntry {
    pub name: String,
    pub package: String,
    /// Base64 PNG icon; empty when the catalog has none.
    pub icon: String,
}

/// Serialize an app list to the JSON carried after [`CMD_RESPONSE_APPS`].
pub fn encode_app_list(apps: &[AppEntry]) -> Result<String, TetherError> {
    Ok(serde_json::to_string(apps)?)
}

pub fn decode_app_list(json: &str) -> Result<Vec<AppEntry>, TetherError> {
    Ok(serde_json::from_str(json)?)
}
