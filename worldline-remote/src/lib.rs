//! # worldline-remote — Remote Authority Client
//!
//! Everything that talks to the remote authority:
//!   - **Query surface** — [`RemoteQuery`] trait plus the `reqwest`-backed
//!     [`HttpRemote`]
//!   - **Push channel** — wire schema ([`PushMessage`], [`OutboundMessage`]),
//!     the [`TransportClient`] state machine and its `tokio-tungstenite` driver
//!   - **Config patch debouncing** — [`PatchDebouncer`]
//!
//! # Architecture
//!
//! ```text
//! socket task ──SocketEvent──▶ TransportClient ──PushMessage──▶ listeners / coordinator
//!      ▲                              │
//!      └──────── outbound text ───────┘   (queued while disconnected)
//! ```

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod debounce;
pub mod error;
pub mod queue;
pub mod socket;
pub mod transport;
pub mod types;

pub use client::{HttpRemote, RemoteQuery, RemoteResult, fetch_hydrate, fetch_poll};
pub use debounce::PatchDebouncer;
pub use error::{FrameError, RemoteError};
pub use queue::OutboundQueue;
pub use transport::{Backoff, ConnectionState, Subscription, TransportAction, TransportClient};
pub use types::{OutboundMessage, PushMessage, RemoteBatch, RemoteWorldState, Windows};
