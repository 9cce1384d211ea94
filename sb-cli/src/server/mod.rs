//! Network side of `sb serve`
//!
//! The relay is exposed as a WebSocket endpoint. Every text frame carries one
//! JSON request and is answered by exactly one text frame.

mod websocket;

pub use websocket::{handle_connection, serve};

use std::io;

use tokio::net::TcpListener;

/// How many following ports are tried when the requested one is taken
pub const PORT_ATTEMPTS: u16 = 10;

/// Bind `host:port`, moving on to the next ports when it is already in use
///
/// Port 0 asks the OS for a free port and is never retried.
pub async fn bind(host: &str, port: u16) -> io::Result<TcpListener> {
    let mut last_err = None;
    for offset in 0..PORT_ATTEMPTS {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    log::warn!("Port {port} is in use, listening on {candidate} instead");
                }
                return Ok(listener);
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse && port != 0 => {
                log::debug!("Port {candidate} is in use");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no free port")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_skips_busy_port() {
        let busy = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken = busy.local_addr().unwrap().port();

        let listener = bind("127.0.0.1", taken).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_ne!(port, taken);
        assert!(port > taken && port < taken + PORT_ATTEMPTS);
    }
}
