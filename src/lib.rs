//! Arena Tanks Server Library
//!
//! Authoritative server for a real-time top-down tank arena over
//! WebTransport, plus the client-side snapshot interpolation model.

pub mod client;
pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
