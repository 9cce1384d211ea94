pub mod console;
pub mod hardware;
pub mod serve;
pub mod target;

pub use target::{TargetArgs, ToolchainArgs};
