//! Snapshot / replay.
//!
//! A [`Snapshot`] is an immutable deep copy of the world's content
//! (config, agents, groups and the four content streams). Loading one
//! rewinds the live model to tick 0 and pauses it; the operator must resume
//! explicitly. Tick scrubbing itself lives in the transition function since
//! derived agent values are recomputed from `(seed, agent, tick)`.
//!
//! Missing ids are a silent no-op for load and delete.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorldlineError};
use crate::types::{
    Agent, AgentId, FeedPost, GroupProfile, InterventionRecord, LogLine, SimConfig,
    TimelineEvent,
};
use crate::world::WorldState;

/// A named, immutable copy of the world's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Unique snapshot id.
    pub id: String,
    /// Operator-supplied label.
    pub name: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Monotonic run counter at creation time.
    pub run_number: u32,
    /// Tick the world was at when the snapshot was taken.
    pub final_tick: u64,
    /// Deep copy of the world's content.
    pub data: SnapshotData,
}

/// The copied part of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    /// Simulation parameters.
    pub config: SimConfig,
    /// Every agent with its state.
    pub agents: BTreeMap<AgentId, Agent>,
    /// Group profiles.
    pub groups: BTreeMap<String, GroupProfile>,
    /// Log lines, oldest first.
    pub logs: Vec<LogLine>,
    /// Timeline events, oldest first.
    pub events: Vec<TimelineEvent>,
    /// Feed posts, oldest first.
    pub feed: Vec<FeedPost>,
    /// Interventions, oldest first.
    pub interventions: Vec<InterventionRecord>,
}

impl SnapshotData {
    /// Copy the content of `state`.
    #[must_use]
    pub fn capture(state: &WorldState) -> Self {
        Self {
            config: state.config.clone(),
            agents: state.agents.clone(),
            groups: state.groups.clone(),
            logs: state.logs.iter().cloned().collect(),
            events: state.events.iter().cloned().collect(),
            feed: state.feed.iter().cloned().collect(),
            interventions: state.interventions.iter().cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations on the world
// ---------------------------------------------------------------------------

/// Record a snapshot of `state` under `id`/`name` and mark it current.
pub fn create(state: &mut WorldState, id: String, name: String, created_at: DateTime<Utc>) {
    let snapshot = Snapshot {
        id,
        name,
        created_at,
        run_number: state.next_run_number,
        final_tick: state.tick,
        data: SnapshotData::capture(state),
    };
    info!(
        id = %snapshot.id,
        run = snapshot.run_number,
        tick = snapshot.final_tick,
        agents = snapshot.data.agents.len(),
        "Snapshot created"
    );
    state.next_run_number = state.next_run_number.saturating_add(1);
    state.current_snapshot_id = Some(snapshot.id.clone());
    state.snapshots.push(snapshot);
}

/// Copy snapshot `id` back into the live world, rewinding to tick 0.
///
/// Returns `false` (and leaves the world untouched) if the id is unknown.
pub fn load(state: &mut WorldState, id: &str) -> bool {
    let Some(data) = state.snapshot(id).map(|s| s.data.clone()) else {
        debug!(id, "Snapshot not found on load, ignoring");
        return false;
    };
    state.config = data.config;
    state.agents = data.agents;
    state.groups = data.groups;
    state.logs.replace_with(data.logs);
    state.events.replace_with(data.events);
    state.feed.replace_with(data.feed);
    state.interventions.replace_with(data.interventions);
    state.tick = 0;
    state.is_running = false;
    state.current_snapshot_id = Some(id.to_string());
    info!(id, "Snapshot loaded");
    true
}

/// Remove snapshot `id`. Clears the current pointer if it pointed at it.
///
/// Returns `false` if the id is unknown.
pub fn delete(state: &mut WorldState, id: &str) -> bool {
    let before = state.snapshots.len();
    state.snapshots.retain(|s| s.id != id);
    let removed = state.snapshots.len() != before;
    if removed && state.current_snapshot_id.as_deref() == Some(id) {
        state.current_snapshot_id = None;
    }
    debug!(id, removed, "Snapshot delete");
    removed
}

/// Remove every snapshot.
pub fn clear(state: &mut WorldState) {
    let count = state.snapshots.len();
    state.snapshots.clear();
    state.current_snapshot_id = None;
    debug!(count, "Snapshots cleared");
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Serialize one snapshot to JSON text.
///
/// # Errors
/// Returns [`WorldlineError::Serialization`] if encoding fails.
pub fn export_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Export snapshot `id` from the world.
///
/// # Errors
/// Returns [`WorldlineError::SnapshotNotFound`] for an unknown id.
pub fn export_by_id(state: &WorldState, id: &str) -> Result<String> {
    let snapshot = state
        .snapshot(id)
        .ok_or_else(|| WorldlineError::SnapshotNotFound(id.to_string()))?;
    export_json(snapshot)
}

/// Parse one snapshot from JSON text.
///
/// # Errors
/// Returns [`WorldlineError::Serialization`] if the text is not a snapshot.
pub fn import_json(json: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(json)?)
}
