use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{IngressRecord, Router};
use crate::transport::message::ServerMessage;
use crate::utils::error::BrokerError;

/// Binds `addr` and serves ingress connections until the listener fails.
///
/// Failing to bind is returned to the caller; it is the one startup error
/// that should stop the process.
pub async fn start_websocket_server(addr: &str, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Ingress server listening on ws://{}", listener.local_addr()?);
    serve(listener, router).await;
    Ok(())
}

/// Accepts connections on an already bound listener.
pub async fn serve(listener: TcpListener, router: Router) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                spawn(handle_connection(stream, router.clone()));
            }
            Err(e) => {
                warn!("Failed to accept connection: {e}");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, router: Router) {
    let client_id = format!("client-{}", uuid::Uuid::new_v4());

    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    debug!("{client_id} connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let payload = match msg {
            WsMessage::Text(_) | WsMessage::Binary(_) => msg.into_data(),
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let reply = handle_payload(&router, &payload).await;
        let text = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize reply for {client_id}: {e}");
                continue;
            }
        };
        if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
            warn!("Failed to send reply to {client_id}: {e}");
            break;
        }
    }

    debug!("{client_id} disconnected");
}

/// Decodes one ingress frame and routes it, producing the acknowledgement.
pub async fn handle_payload(router: &Router, payload: &[u8]) -> ServerMessage {
    let record: IngressRecord = match serde_json::from_slice(payload) {
        Ok(record) => record,
        Err(e) => {
            warn!("Error while decoding message: {e}");
            return BrokerError::Malformed(e.to_string()).into();
        }
    };

    match router.route(record).await {
        Ok(enqueued) => enqueued.into(),
        Err(e) => e.into(),
    }
}
