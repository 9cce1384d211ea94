//! Error taxonomy shared by every layer of the relay.
//!
//! Component errors (`SketchError`, `BoardError`, serial and toolchain errors in
//! `sb-server`) each map onto one `ErrorKind`. Only the kind and a message ever
//! cross the wire.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Machine-readable error kind, serialized by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Section name outside `globals`, `setup`, `loop`, `functions`
    InvalidSection,
    /// Board identity outside the supported set
    UnknownBoard,
    /// Operation needs a board but none was selected
    NoBoardSelected,
    /// Payload value out of range (baud, port, duration, ...)
    InvalidArgument,
    /// Upload or serial operation without a configured port
    NoPortConfigured,
    /// Serial device could not be claimed or was lost
    PortUnavailable,
    /// Serial write without an open connection
    NotOpen,
    /// Toolchain binary missing, failed to start, or timed out
    ToolchainUnavailable,
    /// Compiler reported errors (log attached to the result)
    CompileFailed,
    /// Upload reported errors (log attached to the result)
    UploadFailed,
    /// Missing or wrong bearer token
    Unauthorized,
    /// Operation name not recognised by the server
    UnknownOperation,
    /// Request could not be parsed
    MalformedRequest,
    /// Client could not reach the relay
    ConnectionFailed,
    /// Client gave up waiting for a response
    Timeout,
    /// Local filesystem failure
    Io,
    /// Unexpected server-side failure
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSection => "InvalidSection",
            ErrorKind::UnknownBoard => "UnknownBoard",
            ErrorKind::NoBoardSelected => "NoBoardSelected",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NoPortConfigured => "NoPortConfigured",
            ErrorKind::PortUnavailable => "PortUnavailable",
            ErrorKind::NotOpen => "NotOpen",
            ErrorKind::ToolchainUnavailable => "ToolchainUnavailable",
            ErrorKind::CompileFailed => "CompileFailed",
            ErrorKind::UploadFailed => "UploadFailed",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::UnknownOperation => "UnknownOperation",
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Io => "Io",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error as reported to callers of the relay, local or remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RelayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "Invalid or missing API token")
    }

    pub fn unknown_operation(op: &str) -> Self {
        Self::new(ErrorKind::UnknownOperation, format!("Unknown operation: {op}"))
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
