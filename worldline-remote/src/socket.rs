//! WebSocket driver for the push channel.
//!
//! [`dial`] spawns one task per socket attempt. The task reports what
//! happens as [`SocketEvent`]s tagged with the attempt's generation, and
//! writes whatever text it receives through [`SocketHandle::send`]. All
//! decisions (reconnects, queueing, parsing) stay in
//! [`crate::transport::TransportClient`].

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::types::OutboundMessage;

/// Something that happened on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed.
    Opened { generation: u64 },
    /// A text frame arrived.
    Text { generation: u64, text: String },
    /// A frame kind the protocol does not use arrived.
    Unsupported { generation: u64, kind: &'static str },
    /// The socket closed or never opened.
    Closed { generation: u64, reason: Option<String> },
}

/// Owner side of one socket task.
#[derive(Debug)]
pub struct SocketHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SocketHandle {
    /// Generation this socket was dialed for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Write messages in order. Returns the ones that could not be handed
    /// to the socket task because it has already exited.
    pub fn send(&self, messages: Vec<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut iter = messages.into_iter();
        while let Some(message) = iter.next() {
            if self.outbound.send(message.to_text()).is_err() {
                let mut failed = vec![message];
                failed.extend(iter);
                return failed;
            }
        }
        Vec::new()
    }

    /// Close the socket and stop the task. No `Closed` event follows.
    pub fn hangup(self) {
        self.task.abort();
    }
}

/// Open a socket to `url` in the background.
#[must_use]
pub fn dial(url: String, generation: u64, events: mpsc::UnboundedSender<SocketEvent>) -> SocketHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(url, generation, events, rx));
    SocketHandle { generation, outbound: tx, task }
}

async fn run(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<SocketEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            debug!(%url, generation, error = %err, "Push channel dial failed");
            let _ = events.send(SocketEvent::Closed { generation, reason: Some(err.to_string()) });
            return;
        }
    };
    if events.send(SocketEvent::Opened { generation }).is_err() {
        return;
    }
    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            frame = read.next() => {
                let event = match frame {
                    Some(Ok(Message::Text(text))) => SocketEvent::Text { generation, text },
                    Some(Ok(Message::Binary(_))) => SocketEvent::Unsupported { generation, kind: "binary" },
                    // Pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string());
                    }
                    Some(Err(err)) => break Some(err.to_string()),
                    None => break None,
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            text = outbound.recv() => {
                let Some(text) = text else {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                };
                if let Err(err) = write.send(Message::Text(text)).await {
                    warn!(generation, error = %err, "Push channel write failed");
                    break Some(err.to_string());
                }
            }
        }
    };
    let _ = events.send(SocketEvent::Closed { generation, reason });
}
