//! Websocket event loop for the RTM connection.
//!
//! The read half runs in a spawned task that decodes frames and fans chat
//! messages into an mpsc channel; stream failures go to a separate error
//! channel and are fatal to the process. The write half is shared behind a
//! mutex so the dispatcher and the keep-alive ticker can both submit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::rtm::api::RtmError;
use crate::rtm::event::{InboundMessage, RtmEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// An outbound chat message to submit over the websocket.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub vchannel_id: String,
    pub to_uid: String,
    pub text: String,
}

/// Handle to the live RTM websocket connection.
pub struct RtmLoop {
    write: Arc<Mutex<WsSink>>,
    err_tx: mpsc::Sender<RtmError>,
    call_id: Arc<AtomicU64>,
}

impl RtmLoop {
    /// Connect to the websocket host and start the read task.
    ///
    /// Returns the send handle plus the inbound-message and error channels
    /// the dispatcher selects over.
    pub async fn connect(
        ws_host: &str,
    ) -> Result<(Self, mpsc::Receiver<InboundMessage>, mpsc::Receiver<RtmError>), RtmError> {
        let (ws, _) = tokio_tungstenite::connect_async(ws_host)
            .await
            .map_err(|e| RtmError::Http(format!("websocket connect: {e}")))?;
        let (write, mut read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        let (msg_tx, msg_rx) = mpsc::channel(64);
        let (err_tx, err_rx) = mpsc::channel(4);

        let read_err_tx = err_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let frame = match frame {
                    Ok(f) => f,
                    Err(e) => {
                        let _ = read_err_tx.send(RtmError::Closed(e.to_string())).await;
                        return;
                    }
                };
                let text = match frame {
                    Message::Text(t) => t,
                    Message::Close(_) => {
                        let _ = read_err_tx
                            .send(RtmError::Closed("server closed the connection".into()))
                            .await;
                        return;
                    }
                    _ => continue,
                };
                match RtmEvent::parse(text.as_str()) {
                    Ok(RtmEvent::Message(message)) => {
                        if msg_tx.send(message).await.is_err() {
                            // Dispatcher is gone; nothing left to do.
                            return;
                        }
                    }
                    Ok(RtmEvent::Pong) => debug!("keepalive pong"),
                    Ok(RtmEvent::Ignored) => {}
                    Err(e) => warn!("Dropping malformed event: {e}"),
                }
            }
            let _ = read_err_tx
                .send(RtmError::Closed("event stream ended".into()))
                .await;
        });

        let rtm = Self {
            write,
            err_tx,
            call_id: Arc::new(AtomicU64::new(1)),
        };
        Ok((rtm, msg_rx, err_rx))
    }

    /// Submit one chat message.
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), RtmError> {
        let call_id = self.call_id.fetch_add(1, Ordering::Relaxed);
        let payload = message_payload(call_id, message);
        self.write
            .lock()
            .await
            .send(Message::Text(payload.to_string().into()))
            .await
            .map_err(|e| RtmError::Closed(format!("send failed: {e}")))
    }

    /// Spawn the keep-alive ticker. A failed ping is forwarded to the error
    /// channel and stops the ticker; the dispatcher treats it as fatal.
    pub fn start_keepalive(&self, interval: Duration) {
        let write = self.write.clone();
        let err_tx = self.err_tx.clone();
        let call_id = self.call_id.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let payload = ping_payload(call_id.fetch_add(1, Ordering::Relaxed));
                let result = write
                    .lock()
                    .await
                    .send(Message::Text(payload.to_string().into()))
                    .await;
                if let Err(e) = result {
                    let _ = err_tx
                        .send(RtmError::Closed(format!("keepalive send failed: {e}")))
                        .await;
                    return;
                }
            }
        });
    }
}

fn message_payload(call_id: u64, message: &OutboundMessage) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "vchannel_id": message.vchannel_id,
        "to_uid": message.to_uid,
        "call_id": call_id,
        "refer_key": null,
        "text": message.text,
    })
}

fn ping_payload(call_id: u64) -> serde_json::Value {
    serde_json::json!({ "type": "ping", "call_id": call_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_shape() {
        let message = OutboundMessage {
            vchannel_id: "=bwV11".to_string(),
            to_uid: "=bwQQQ".to_string(),
            text: "1. buy milk".to_string(),
        };
        let payload = message_payload(42, &message);
        assert_eq!(payload["type"], "message");
        assert_eq!(payload["vchannel_id"], "=bwV11");
        assert_eq!(payload["to_uid"], "=bwQQQ");
        assert_eq!(payload["call_id"], 42);
        assert_eq!(payload["refer_key"], serde_json::Value::Null);
        assert_eq!(payload["text"], "1. buy milk");
    }

    #[test]
    fn test_ping_payload_shape() {
        let payload = ping_payload(7);
        assert_eq!(payload["type"], "ping");
        assert_eq!(payload["call_id"], 7);
    }
}
