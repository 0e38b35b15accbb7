//! # tether-hub
//!
//! Initiator side of the link. Dials one of the configured satellites,
//! remembers the chosen one, and exposes the link through a terminal
//! dashboard with a command line.

pub mod app;
pub mod command;
pub mod config;
pub mod hub;
pub mod store;

pub use app::{App, Tab, UiEvent};
pub use command::HubCommand;
pub use config::HubConfig;
pub use hub::{Hub, HubEvent};
pub use store::FilePeerStore;
