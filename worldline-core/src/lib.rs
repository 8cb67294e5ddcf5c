//! # Worldline Core Library
//!
//! I/O-free world model for agent social simulations fed from several
//! asynchronous sources. Everything here is deterministic and synchronous;
//! network plumbing lives in `worldline-remote` and the driving loop in
//! `worldline-session`.
//!
//! - **Generator** — `(seed, agent, tick, salt) → [0, 1)`; profiles and
//!   per-tick values are pure functions, so any tick can be revisited in O(1)
//! - **World model** — [`WorldState`], changed only by [`transition::apply`]
//! - **Bounded buffers** — FIFO eviction for feed, events, logs,
//!   interventions and diagnostics
//! - **Snapshots** — deep copies that can be listed, loaded, deleted, exported
//! - **Mock simulator** — accumulator-driven ticks when no server exists
//! - **Scheduler** — named tasks over an injectable [`scheduler::Clock`]
//! - **Dedup sets** — LRU-bounded claim-then-ingest membership
//!
//! ## Invariants
//!
//! - Buffer lengths never exceed their configured capacity
//! - `tick` stays within `[0, MAX_TICK]`
//! - Agents are only ever added, never removed
//! - The transition function never fails

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod buffer;
pub mod config;
pub mod dedup;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod scheduler;
pub mod simulator;
pub mod snapshot;
pub mod transition;
pub mod types;
pub mod world;

pub use buffer::BoundedBuffer;
pub use config::WorldlineConfig;
pub use dedup::{DedupSet, DedupSets, Stream};
pub use error::WorldlineError;
pub use metrics::SyncCounters;
pub use scheduler::{Clock, Scheduler, SystemClock, TaskKind, VirtualClock};
pub use simulator::MockSimulator;
pub use snapshot::Snapshot;
pub use transition::{Transition, apply};
pub use types::*;
pub use world::{WorldState, WorldView};
