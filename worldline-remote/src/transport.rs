//! Push-channel transport client.
//!
//! A sans-IO state machine: the socket driver ([`crate::socket`]) reports
//! what happened on the wire and the client answers with what to do next.
//!
//! ```text
//!             connect()            on_open()
//! Disconnected ─────────▶ Connecting ─────────▶ Connected
//!      ▲                      │                     │
//!      └──── on_close() ──────┴─────────────────────┘
//!            (reconnect after backoff unless disconnect() was called)
//! ```
//!
//! Backoff starts at the floor, doubles on each consecutive failure up to
//! the ceiling, and resets to the floor on a successful open. Every socket
//! attempt gets a generation number so late events from an abandoned socket
//! are ignored.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use worldline_core::config::TransportConfig;
use worldline_core::metrics::SyncCounters;

use crate::error::FrameError;
use crate::queue::OutboundQueue;
use crate::types::{OutboundMessage, PushMessage};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Doubling reconnect delay, bounded by a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    floor_ms: u64,
    ceiling_ms: u64,
    current_ms: u64,
}

impl Backoff {
    /// Start at `floor_ms`; never exceed `ceiling_ms`.
    #[must_use]
    pub fn new(floor_ms: u64, ceiling_ms: u64) -> Self {
        let floor_ms = floor_ms.max(1);
        let ceiling_ms = ceiling_ms.max(floor_ms);
        Self { floor_ms, ceiling_ms, current_ms: floor_ms }
    }

    /// Delay to wait before the next attempt; doubles the one after.
    pub fn next_delay(&mut self) -> u64 {
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.ceiling_ms);
        delay
    }

    /// Back to the floor after a success.
    pub fn reset(&mut self) {
        self.current_ms = self.floor_ms;
    }

    /// Delay the next failure would get.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.current_ms
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

type Listener = Arc<dyn Fn(&PushMessage) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`TransportClient::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut listeners = registry.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(id, _)| *id != self.id);
        listeners.entries.len() != before
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.entries.len()).finish()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// What the driver should do after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    /// Open a socket for this generation.
    Dial { generation: u64 },
    /// Close the current socket.
    Hangup,
    /// Schedule a reconnect at this clock reading.
    ReconnectAt { due_ms: u64 },
    /// Nothing to do.
    Idle,
}

/// Push-channel client: lifecycle, outbound queue and listener fan-out.
#[derive(Debug)]
pub struct TransportClient {
    url: String,
    state: ConnectionState,
    intentional_disconnect: bool,
    generation: u64,
    backoff: Backoff,
    queue: OutboundQueue,
    greeting: Option<OutboundMessage>,
    listeners: Arc<Mutex<Listeners>>,
    counters: Arc<SyncCounters>,
    client_id: Option<String>,
}

impl TransportClient {
    /// A disconnected client for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, config: &TransportConfig, counters: Arc<SyncCounters>) -> Self {
        Self {
            url: url.into(),
            state: ConnectionState::Disconnected,
            intentional_disconnect: false,
            generation: 0,
            backoff: Backoff::new(config.backoff_floor_ms, config.backoff_ceiling_ms),
            queue: OutboundQueue::new(config.max_outbound_queue),
            greeting: None,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            counters,
            client_id: None,
        }
    }

    /// Message sent first on every successful open (typically `subscribe`).
    pub fn set_greeting(&mut self, greeting: Option<OutboundMessage>) {
        self.greeting = greeting;
    }

    /// Socket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the current (or last) socket attempt.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Id the server assigned in its `connected` message.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Backoff state, for inspection.
    #[must_use]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Outbound queue, for inspection.
    #[must_use]
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Begin connecting. No-op unless disconnected.
    pub fn connect(&mut self) -> TransportAction {
        self.intentional_disconnect = false;
        if self.state != ConnectionState::Disconnected {
            return TransportAction::Idle;
        }
        self.state = ConnectionState::Connecting;
        self.generation += 1;
        debug!(url = %self.url, generation = self.generation, "Push channel connecting");
        TransportAction::Dial { generation: self.generation }
    }

    /// Close on purpose; no reconnect will be scheduled.
    pub fn disconnect(&mut self) -> TransportAction {
        self.intentional_disconnect = true;
        if self.state == ConnectionState::Disconnected {
            return TransportAction::Idle;
        }
        self.state = ConnectionState::Disconnected;
        info!(url = %self.url, "Push channel disconnected by request");
        TransportAction::Hangup
    }

    /// The socket for `generation` opened. Returns messages to write now,
    /// greeting first, then the queued backlog oldest-first.
    pub fn on_open(&mut self, generation: u64) -> Vec<OutboundMessage> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(generation, current = self.generation, "Ignoring stale open");
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        SyncCounters::bump(&self.counters.transport_connects);
        let backlog = self.queue.drain();
        SyncCounters::add(&self.counters.outbound_flushed, backlog.len() as u64);
        info!(url = %self.url, flushed = backlog.len(), "Push channel connected");
        self.greeting.iter().cloned().chain(backlog).collect()
    }

    /// The socket for `generation` closed or failed to open.
    ///
    /// Returns when to retry, unless the close was requested.
    pub fn on_close(&mut self, generation: u64, now_ms: u64, reason: Option<&str>) -> TransportAction {
        if generation != self.generation {
            return TransportAction::Idle;
        }
        let was = self.state;
        self.state = ConnectionState::Disconnected;
        self.client_id = None;
        if was == ConnectionState::Connected {
            SyncCounters::bump(&self.counters.transport_disconnects);
        }
        if self.intentional_disconnect {
            return TransportAction::Idle;
        }
        let delay = self.backoff.next_delay();
        SyncCounters::bump(&self.counters.transport_reconnects);
        warn!(
            url = %self.url,
            reason = reason.unwrap_or("closed"),
            delay_ms = delay,
            "Push channel lost, reconnecting after backoff"
        );
        TransportAction::ReconnectAt { due_ms: now_ms.saturating_add(delay) }
    }

    /// Queue `message`. It is written immediately if connected (see
    /// [`TransportClient::take_outbound`]), otherwise on the next open.
    pub fn send(&mut self, message: OutboundMessage) {
        if self.state != ConnectionState::Connected {
            SyncCounters::bump(&self.counters.outbound_queued);
        }
        if self.queue.enqueue(message) {
            SyncCounters::bump(&self.counters.outbound_dropped);
        }
    }

    /// Messages ready to write now. Empty unless connected.
    pub fn take_outbound(&mut self) -> Vec<OutboundMessage> {
        if self.state != ConnectionState::Connected {
            return Vec::new();
        }
        self.queue.drain()
    }

    /// Writing failed; keep the messages for the next open.
    pub fn requeue(&mut self, messages: Vec<OutboundMessage>) {
        self.queue.requeue_front(messages);
    }

    /// Queue a keepalive ping if connected.
    pub fn heartbeat(&mut self) {
        if self.state == ConnectionState::Connected {
            self.send(OutboundMessage::Ping {});
        }
    }

    /// Register a listener for every parsed inbound message.
    pub fn subscribe(&self, listener: impl Fn(&PushMessage) + Send + Sync + 'static) -> Subscription {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription { id, registry: Arc::downgrade(&self.listeners) }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Drop every listener (teardown).
    pub fn clear_listeners(&self) {
        self.listeners.lock().entries.clear();
    }

    /// A text frame arrived on socket `generation`.
    ///
    /// Malformed frames are logged, counted and dropped. Parsed messages are
    /// fanned out to listeners, each isolated from the others' panics, and
    /// returned to the caller.
    pub fn on_frame(&mut self, generation: u64, text: &str) -> Option<PushMessage> {
        if generation != self.generation {
            return None;
        }
        let message = match PushMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                self.drop_frame(&err);
                return None;
            }
        };
        if let PushMessage::Connected { client_id } = &message {
            self.client_id = Some(client_id.clone());
        }
        self.dispatch(&message);
        Some(message)
    }

    /// A frame that cannot carry a message (binary) was received.
    pub fn on_unsupported(&mut self, kind: &'static str) {
        self.drop_frame(&FrameError::Unsupported(kind));
    }

    fn drop_frame(&self, err: &FrameError) {
        SyncCounters::bump(&self.counters.frames_dropped);
        warn!(error = %err, "Dropping inbound frame");
    }

    fn dispatch(&self, message: &PushMessage) {
        // Snapshot so listeners may (un)subscribe without deadlocking.
        let listeners: Vec<(u64, Listener)> = self.listeners.lock().entries.clone();
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                warn!(listener = id, kind = message.kind(), "Listener panicked, continuing");
            }
        }
    }
}
