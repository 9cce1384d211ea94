//! Client-side transports
//!
//! A transport carries one [`RelayRequest`] to a relay and brings back the
//! matching [`RelayResponse`]. Serialization happens inside the transport.

mod loopback;
#[cfg(feature = "ws")]
mod websocket;

pub use loopback::LoopbackTransport;
#[cfg(feature = "ws")]
pub use websocket::WebSocketTransport;

use std::time::Duration;

use sb_model::{ErrorKind, RelayError, RelayRequest, RelayResponse};

/// Trait for client-side transport implementations
///
/// Requests are strictly sequential: a call returns only once the response to
/// its request has arrived or the timeout has elapsed.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sb_client::transport::{ClientTransport, TransportError};
/// use sb_model::{RelayError, RelayRequest, RelayResponse};
///
/// struct Refusing;
///
/// impl ClientTransport for Refusing {
///     fn round_trip(
///         &mut self,
///         request: &RelayRequest,
///         _timeout: Duration,
///     ) -> Result<RelayResponse, TransportError> {
///         Ok(RelayResponse::failure(request.id, RelayError::unauthorized()))
///     }
/// }
/// ```
pub trait ClientTransport: Send {
    /// Send a request and wait for its response
    ///
    /// # Arguments
    ///
    /// * `request` - The request to send, token already attached
    /// * `timeout` - How long to wait for the response
    ///
    /// # Returns
    ///
    /// * `Ok(RelayResponse)` for any response the relay produced, including
    ///   error responses
    /// * `Err(TransportError)` if no response could be obtained
    fn round_trip(&mut self, request: &RelayRequest, timeout: Duration) -> Result<RelayResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to relay at '{url}': {reason}")]
    Connect { url: String, reason: String },
    #[error("Connection to relay lost: {0}")]
    ConnectionLost(String),
    #[error("No response from relay within {} s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("Invalid response from relay: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connect { .. } | TransportError::ConnectionLost(_) => {
                ErrorKind::ConnectionFailed
            }
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Protocol(_) => ErrorKind::MalformedRequest,
        }
    }
}

impl From<TransportError> for RelayError {
    fn from(err: TransportError) -> Self {
        RelayError::new(err.kind(), err.to_string())
    }
}
