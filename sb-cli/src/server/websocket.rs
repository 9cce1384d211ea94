use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use sb_model::{RelayError, RelayResponse};
use sb_server::RelayServer;
use sb_server::relay::{encode_response, request_id};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Accept connections until the listener fails
///
/// Each connection gets its own task. Requests from all connections share the
/// relay's single session and are therefore run one at a time.
pub async fn serve(listener: TcpListener, relay: Arc<RelayServer>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, relay).await {
                log::warn!("Connection from {peer} ended with error: {e}");
            }
        });
    }
}

/// Serve one WebSocket connection
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, relay: Arc<RelayServer>) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    log::info!("Client connected: {peer}");
    let (mut write, mut read) = ws.split();

    while let Some(message) = read.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => break,
            // Pings are answered by tungstenite
            _ => continue,
        };

        let response = answer(&relay, text).await;
        write.send(Message::Text(response)).await?;
    }

    log::info!("Client disconnected: {peer}");
    Ok(())
}

/// Run one request on a blocking thread; hardware calls may take minutes
async fn answer(relay: &Arc<RelayServer>, text: String) -> String {
    let id = request_id(&text);
    let relay = Arc::clone(relay);
    match tokio::task::spawn_blocking(move || relay.handle_text(&text)).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Request {id} panicked: {e}");
            encode_response(&RelayResponse::failure(
                id,
                RelayError::internal("Request handler failed"),
            ))
        }
    }
}
