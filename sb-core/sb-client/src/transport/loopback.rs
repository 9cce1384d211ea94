//! In-process transport
//!
//! Hands requests straight to a [`RelayServer`] living in the same process,
//! still going through the JSON encoding used on the wire.

use std::sync::Arc;
use std::time::Duration;

use sb_model::{RelayRequest, RelayResponse};
use sb_server::RelayServer;

use super::{ClientTransport, TransportError};

pub struct LoopbackTransport {
    server: Arc<RelayServer>,
}

impl LoopbackTransport {
    pub fn new(server: Arc<RelayServer>) -> Self {
        Self { server }
    }
}

impl ClientTransport for LoopbackTransport {
    fn round_trip(&mut self, request: &RelayRequest, _timeout: Duration) -> Result<RelayResponse, TransportError> {
        let text = serde_json::to_string(request)
            .map_err(|e| TransportError::Protocol(format!("Failed to serialize request: {e}")))?;
        let reply = self.server.handle_text(&text);
        RelayResponse::parse(&reply).map_err(|e| TransportError::Protocol(e.message))
    }
}
