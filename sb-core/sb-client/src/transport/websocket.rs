//! WebSocket client transport
//!
//! Implements `ClientTransport` using synchronous `tungstenite`. The
//! connection is opened on first use; after any failure it is dropped and
//! opened again by the next request.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use sb_model::{RelayRequest, RelayResponse};
use tungstenite::client::IntoClientRequest;
use tungstenite::{Message, WebSocket};

use super::{ClientTransport, TransportError};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket client transport
///
/// Each request is one text frame holding the JSON request; the relay answers
/// with one text frame holding the JSON response.
pub struct WebSocketTransport {
    url: String,
    socket: Option<WebSocket<TcpStream>>,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// Create a transport for `url` (e.g. `ws://192.168.1.20:5000/`)
    ///
    /// No connection is made until the first request.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn connect(&self) -> Result<WebSocket<TcpStream>, TransportError> {
        let connect_err = |reason: String| TransportError::Connect {
            url: self.url.clone(),
            reason,
        };

        let request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_err(e.to_string()))?;
        let uri = request.uri();
        if uri.scheme_str() != Some("ws") {
            return Err(connect_err("only ws:// relays are supported".to_string()));
        }
        let host = uri
            .host()
            .ok_or_else(|| connect_err("missing host".to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(80);

        let addrs = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?;
        let mut last_error = None;
        let stream = addrs
            .into_iter()
            .find_map(|addr| match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    last_error = Some(e);
                    None
                }
            })
            .ok_or_else(|| {
                connect_err(last_error.map_or_else(|| "host has no address".to_string(), |e| e.to_string()))
            })?;

        // Bound the handshake; each request sets its own timeout afterwards
        stream
            .set_read_timeout(Some(self.connect_timeout))
            .map_err(|e| connect_err(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {e}");
        }

        let (socket, _) = tungstenite::client(request, stream).map_err(|e| connect_err(e.to_string()))?;
        log::info!("Connected to relay at {}", self.url);
        Ok(socket)
    }

    fn exchange(
        socket: &mut WebSocket<TcpStream>,
        request: &RelayRequest,
        timeout: Duration,
    ) -> Result<RelayResponse, TransportError> {
        let lost = |e: &dyn std::fmt::Display| TransportError::ConnectionLost(e.to_string());

        let text = serde_json::to_string(request)
            .map_err(|e| TransportError::Protocol(format!("Failed to serialize request: {e}")))?;
        socket
            .get_mut()
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(|e| lost(&e))?;
        socket.send(Message::Text(text)).map_err(|e| lost(&e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match socket.read() {
                Ok(Message::Text(reply)) => {
                    let response = RelayResponse::parse(&reply).map_err(|e| TransportError::Protocol(e.message))?;
                    if response.id != request.id {
                        return Err(TransportError::Protocol(format!(
                            "response id {} does not match request {}",
                            response.id, request.id
                        )));
                    }
                    return Ok(response);
                }
                Ok(Message::Close(_)) => {
                    return Err(TransportError::ConnectionLost(
                        "relay closed the connection".to_string(),
                    ));
                }
                Ok(_) => {
                    // Pings are answered by tungstenite; nothing else is expected
                }
                Err(tungstenite::Error::Io(ref e))
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(TransportError::Timeout(timeout));
                }
                Err(e) => return Err(lost(&e)),
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout(timeout));
            }
        }
    }
}

impl ClientTransport for WebSocketTransport {
    fn round_trip(&mut self, request: &RelayRequest, timeout: Duration) -> Result<RelayResponse, TransportError> {
        if self.socket.is_none() {
            let socket = self.connect()?;
            self.socket = Some(socket);
        }
        let Some(socket) = self.socket.as_mut() else {
            return Err(TransportError::ConnectionLost("not connected".to_string()));
        };

        let result = Self::exchange(socket, request, timeout);
        if let Err(e) = &result {
            // A late response would be mistaken for the next one
            log::warn!("Dropping relay connection: {e}");
            self.socket = None;
        }
        result
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_model::{ErrorKind, RelayCommand, RelayError};
    use std::net::TcpListener;

    #[test]
    fn test_connection_refused_is_connection_failed() {
        // Bind then drop to find a port with nothing listening
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let mut transport = WebSocketTransport::new(format!("ws://127.0.0.1:{port}/"))
            .with_connect_timeout(Duration::from_secs(2));

        let request = RelayRequest::new(1, &RelayCommand::Status, None);
        let err = transport.round_trip(&request, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert_eq!(RelayError::from(err).kind, ErrorKind::ConnectionFailed);
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_rejects_tls_urls() {
        let mut transport = WebSocketTransport::new("wss://relay.example:443/");
        let request = RelayRequest::new(1, &RelayCommand::Status, None);
        let err = transport.round_trip(&request, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { ref reason, .. } if reason.contains("ws://")));
    }

    #[test]
    fn test_silent_server_times_out() {
        // Accepts TCP but never completes the handshake
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = WebSocketTransport::new(format!("ws://127.0.0.1:{port}/"))
            .with_connect_timeout(Duration::from_millis(300));

        let request = RelayRequest::new(1, &RelayCommand::Status, None);
        let err = transport.round_trip(&request, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        drop(listener);
    }
}
