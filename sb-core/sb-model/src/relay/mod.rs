//! Relay wire types
//!
//! A request travels as a [`RelayRequest`] envelope whose `op` and `payload`
//! are decoded in two steps into a typed [`RelayCommand`], so an unrecognised
//! operation and a bad payload for a known one are reported differently.

pub mod api;
pub mod command;

pub use api::{BuildOutcome, RelayRequest, RelayResponse, RelayResult, SessionStatus};
pub use command::{Operation, RelayCommand};

/// Largest listen window a relay accepts, in seconds
pub const MAX_LISTEN_SECS: f64 = 600.0;
