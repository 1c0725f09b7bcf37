//! Client-side reconciliation of server snapshots
//!
//! No rendering lives here: a front end feeds [`world::ClientWorld`] the
//! messages it receives together with its own clock and reads back
//! smoothed entity state.

pub mod interpolation;
pub mod world;
