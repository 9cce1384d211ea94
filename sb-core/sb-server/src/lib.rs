//! Hardware side of the sketch relay: serial bridge, toolchain gateway, the
//! session that ties them together and the request handler that exposes the
//! session to remote callers.

pub mod auth;
pub mod relay;
pub mod serial;
pub mod session;
pub mod toolchain;

pub use auth::Credential;
pub use relay::RelayServer;
pub use serial::{SerialBridge, SerialError};
pub use session::{Session, dispatch};
pub use toolchain::{ToolchainError, ToolchainGateway};
