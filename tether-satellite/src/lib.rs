//! # tether-satellite
//!
//! Responder side of the link. Listens for the hub, shows mirrored
//! notifications, receives files, reports device status and carries out
//! power and do-not-disturb commands.

pub mod config;
pub mod device;
pub mod service;
