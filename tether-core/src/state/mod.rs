pub mod connection;
mod link;

pub use connection::{ConnectionPhase, Role};
pub use link::LinkState;
