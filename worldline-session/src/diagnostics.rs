//! User-visible failure lines.
//!
//! Sync failures, rejected interventions and dropped frames end up in the
//! world's bounded diagnostic buffer, never as errors thrown at the caller.

use worldline_core::transition::{Transition, apply_in_place};
use worldline_core::types::{DiagnosticLine, LogLevel};
use worldline_core::world::WorldState;

/// Build a diagnostic line stamped with the world's current tick.
#[must_use]
pub fn line(tick: u64, level: LogLevel, text: impl Into<String>) -> DiagnosticLine {
    DiagnosticLine {
        id: format!("diag-{}", uuid::Uuid::new_v4().simple()),
        tick,
        at_ms: chrono::Utc::now().timestamp_millis(),
        level,
        text: text.into(),
    }
}

/// Append an error line to `world`.
pub fn report(world: &mut WorldState, text: impl Into<String>) {
    let line = line(world.tick, LogLevel::Error, text);
    apply_in_place(world, Transition::PushDiagnostic { line });
}

