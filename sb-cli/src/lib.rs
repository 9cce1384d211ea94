//! SketchBridge CLI library.
//!
//! Exposes the `sb` commands for use in tests:
//! - `serve`: run the relay for the hardware attached to this machine
//! - `console`: edit sketches and drive a board, locally or through a relay
//! - `boards` / `ports`: inventory of supported boards and serial ports

pub mod commands;
pub mod config;
pub mod messages;
pub mod project;
pub mod server;

pub use commands::console::{Console, ConsoleCommand, Flow};
pub use project::Project;
