use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::IngressRecord;
use crate::transport::ServerMessage;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("invalid reply from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("connection closed before a reply arrived")]
    Closed,
}

/// A connection to a broker's ingress server.
///
/// Each `send` writes one record and waits for its acknowledgement.
pub struct Client {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, record: &IngressRecord) -> Result<ServerMessage, ClientError> {
        let text = serde_json::to_string(record)?;
        self.stream.send(WsMessage::text(text)).await?;
        self.read_reply().await
    }

    /// Sends a raw frame, bypassing record encoding.
    pub async fn send_raw(&mut self, text: &str) -> Result<ServerMessage, ClientError> {
        self.stream.send(WsMessage::text(text)).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<ServerMessage, ClientError> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                msg @ (WsMessage::Text(_) | WsMessage::Binary(_)) => {
                    return Ok(serde_json::from_slice(&msg.into_data())?);
                }
                WsMessage::Close(_) => break,
                _ => continue,
            }
        }
        Err(ClientError::Closed)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
