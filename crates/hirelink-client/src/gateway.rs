//! Client side of the live channel.
//!
//! [`GatewayClient`] owns one WebSocket connection to the server gateway.
//! It is created by whoever owns the conversation view (and torn down with
//! it) -- deliberately not a process-wide singleton. Incoming frames are
//! decoded on a reader task and handed over as [`ServerEvent`]s on a
//! channel; the owner drains that channel wherever its event loop lives.

use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use hirelink_shared::protocol::{ClientEvent, ServerEvent};
use hirelink_shared::types::UserId;

use crate::error::ClientError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// An authenticated connection to the gateway.
pub struct GatewayClient {
    sink: WsSink,
    reader: JoinHandle<()>,
}

impl GatewayClient {
    /// Connect and authenticate.
    ///
    /// The bearer token is presented at the handshake; the server rejects
    /// the upgrade outright on a bad credential, so a successful return
    /// means the connection is live and registered. Returns the connection
    /// plus the receiving end of the decoded event stream. The stream ends
    /// when the connection drops; reconnecting is the caller's decision
    /// (after which any conversation room must be re-joined).
    pub async fn connect(
        server_url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>), ClientError> {
        let url = format!("{}/ws?token={}", server_url.trim_end_matches('/'), token);
        let (stream, _response) = connect_async(url.as_str()).await?;
        debug!("gateway connected");

        let (sink, mut ws_rx) = stream.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match ServerEvent::from_json(text.as_str()) {
                        Ok(event) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "undecodable gateway frame");
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "gateway connection error");
                        break;
                    }
                }
            }
            debug!("gateway reader finished");
        });

        Ok((Self { sink, reader }, event_rx))
    }

    /// Send one event to the gateway.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        let json = event.to_json()?;
        self.sink.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    pub async fn join_conversation(&mut self, peer: UserId) -> Result<(), ClientError> {
        self.send(&ClientEvent::JoinConversation { user_id: peer })
            .await
    }

    pub async fn leave_conversation(&mut self, peer: UserId) -> Result<(), ClientError> {
        self.send(&ClientEvent::LeaveConversation { user_id: peer })
            .await
    }

    /// Close the connection politely. Dropping the client has the same
    /// effect, minus the close frame.
    pub async fn close(mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        self.reader.abort();
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
