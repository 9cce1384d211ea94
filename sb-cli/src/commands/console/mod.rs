pub mod args;
pub mod command;
pub mod handler;

pub use args::ConsoleArgs;
pub use command::ConsoleCommand;
pub use handler::{Console, Flow, handle_console};
