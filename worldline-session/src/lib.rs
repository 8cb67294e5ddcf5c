//! # worldline-session — Synchronization and Session Driver
//!
//! Ties `worldline-core` and `worldline-remote` together into one running
//! session that owns the world model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Session                      │
//! │  ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ MockSimulator│   │   SyncCoordinator    │  │
//! │  │ (local mode) │   │ hydrate · poll · push│  │
//! │  └──────┬───────┘   └──────────┬───────────┘  │
//! │         │      transitions     │              │
//! │         ▼                      ▼              │
//! │    ┌──────────────────────────────────────┐   │
//! │    │     WorldState (worldline-core)      │   │
//! │    └──────────────────────────────────────┘   │
//! │    ┌──────────────────────────────────────┐   │
//! │    │ RemoteQuery · TransportClient        │   │
//! │    │          (worldline-remote)          │   │
//! │    └──────────────────────────────────────┘   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `coordinator` — claim-then-ingest reconciliation of remote data
//! - `intents` — toggle run, set speed, apply intervention
//! - `session` — the driving loop and its command handle
//! - `diagnostics` — user-visible failure lines

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod diagnostics;
pub mod intents;
pub mod session;

pub use coordinator::{IngestReport, SyncCoordinator, SyncOutcome, SyncPhase};
pub use intents::{IntentOutcome, InterventionOutcome};
pub use session::{Command, Session, SessionHandle};
