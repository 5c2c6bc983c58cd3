//! Integration layer
//!
//! Wires the components together: configuration for all of them and the
//! listening session that connects position, proximity and playback.

mod config;
mod session;

pub use config::{AppConfig, ServiceConfig};
pub use session::ListeningSession;
