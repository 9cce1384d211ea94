//! Caller side of the sketch relay
//!
//! [`Executor`] is the capability every front end programs against.
//! [`LocalExecutor`] drives hardware on this machine, [`RemoteExecutor`]
//! forwards each command to a relay through a [`transport::ClientTransport`].

pub mod executor;
pub mod local;
pub mod remote;
pub mod specifier;
pub mod transport;

pub use executor::Executor;
pub use local::LocalExecutor;
pub use remote::RemoteExecutor;
pub use specifier::HostSpecifier;
