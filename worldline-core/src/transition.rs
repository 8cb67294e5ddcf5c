//! The transition function, the only way the world model changes.
//!
//! `apply(state, transition) -> state'` never fails. Descriptors that do not
//! make sense for the current state (unknown snapshot, unknown kind) return
//! the state unchanged.
//!
//! Transitions are plain serde values tagged by `type`, so they can be
//! logged, replayed, or produced by another process.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, WorldlineError};
use crate::generator;
use crate::snapshot;
use crate::types::{
    AgentId, AgentProfile, AgentState, AgentStatePatch, ConfigPatch, DiagnosticLine, FeedPost,
    GroupProfile, InterventionRecord, LogLine, MAX_TICK, Mode, TimelineEvent,
};
use crate::world::{WorldState, clamp_speed};

/// A typed description of one change to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Transition {
    /// Move the tick pointer. Out-of-range values are clamped to `[0, MAX_TICK]`.
    SetTick {
        /// Requested tick; may be negative or past the end.
        tick: i64,
    },
    /// Start or pause the simulation.
    SetRunning {
        /// New run flag.
        is_running: bool,
    },
    /// Change the speed multiplier (clamped).
    SetSpeed {
        /// Requested multiplier.
        speed: f64,
    },
    /// Select an agent for inspection, or clear the selection.
    SelectAgent {
        /// Agent to select, `None` to clear.
        agent_id: Option<AgentId>,
    },
    /// Append a log line.
    PushLog {
        /// Line to append.
        log: LogLine,
    },
    /// Append a timeline event.
    PushEvent {
        /// Event to append.
        event: TimelineEvent,
    },
    /// Append a feed post.
    PushFeed {
        /// Post to append.
        post: FeedPost,
    },
    /// Append a diagnostic line.
    PushDiagnostic {
        /// Line to append.
        line: DiagnosticLine,
    },
    /// Record an intervention, materializing its target agent.
    ApplyIntervention {
        /// Record to append.
        record: InterventionRecord,
    },
    /// Shallow-merge simulation parameters.
    SetConfig {
        /// Fields to overwrite.
        patch: ConfigPatch,
    },
    /// Shallow-merge one agent's mutable state.
    MutateAgentState {
        /// Agent to change; created if absent.
        agent_id: AgentId,
        /// Fields to overwrite.
        patch: AgentStatePatch,
    },
    /// Install an agent wholesale (hydration).
    SeedAgent {
        /// Agent to install.
        agent_id: AgentId,
        /// Profile; the existing one is kept when `None`.
        #[serde(default)]
        profile: Option<AgentProfile>,
        /// Full state.
        state: AgentState,
    },
    /// Replace all group profiles (hydration).
    SetGroups {
        /// Groups keyed by group key.
        groups: BTreeMap<String, GroupProfile>,
    },
    /// Capture a snapshot.
    CreateSnapshot {
        /// Id of the new snapshot.
        id: String,
        /// Operator-supplied label.
        name: String,
        /// Capture time.
        created_at: DateTime<Utc>,
    },
    /// Restore a snapshot.
    LoadSnapshot {
        /// Snapshot to restore.
        id: String,
    },
    /// Remove a snapshot.
    DeleteSnapshot {
        /// Snapshot to remove.
        id: String,
    },
    /// Remove every snapshot.
    ClearSnapshots,
    /// Any unrecognized kind; applying it changes nothing.
    #[serde(other)]
    Unknown,
}

impl Transition {
    /// Snapshot transition with a fresh id stamped now.
    #[must_use]
    pub fn create_snapshot(name: impl Into<String>) -> Self {
        Self::CreateSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Decode a transition from JSON.
    ///
    /// # Errors
    /// Returns [`WorldlineError::InvalidTransition`] if the JSON is malformed.
    /// An unrecognized `type` decodes to [`Transition::Unknown`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| WorldlineError::InvalidTransition(e.to_string()))
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetTick { .. } => "set_tick",
            Self::SetRunning { .. } => "set_running",
            Self::SetSpeed { .. } => "set_speed",
            Self::SelectAgent { .. } => "select_agent",
            Self::PushLog { .. } => "push_log",
            Self::PushEvent { .. } => "push_event",
            Self::PushFeed { .. } => "push_feed",
            Self::PushDiagnostic { .. } => "push_diagnostic",
            Self::ApplyIntervention { .. } => "apply_intervention",
            Self::SetConfig { .. } => "set_config",
            Self::MutateAgentState { .. } => "mutate_agent_state",
            Self::SeedAgent { .. } => "seed_agent",
            Self::SetGroups { .. } => "set_groups",
            Self::CreateSnapshot { .. } => "create_snapshot",
            Self::LoadSnapshot { .. } => "load_snapshot",
            Self::DeleteSnapshot { .. } => "delete_snapshot",
            Self::ClearSnapshots => "clear_snapshots",
            Self::Unknown => "unknown",
        }
    }
}

/// Clamp a requested tick into `[0, MAX_TICK]`.
#[must_use]
pub fn clamp_tick(tick: i64) -> u64 {
    u64::try_from(tick).map_or(0, |t| t.min(MAX_TICK))
}

/// Apply `transition` to `state`, returning the new state.
#[must_use]
pub fn apply(mut state: WorldState, transition: Transition) -> WorldState {
    apply_in_place(&mut state, transition);
    state
}

/// In-place form of [`apply`], used by drivers that own the world.
pub fn apply_in_place(state: &mut WorldState, transition: Transition) {
    trace!(kind = transition.kind(), tick = state.tick, "Applying transition");
    match transition {
        Transition::SetTick { tick } => set_tick(state, clamp_tick(tick)),
        Transition::SetRunning { is_running } => state.is_running = is_running,
        Transition::SetSpeed { speed } => state.speed = clamp_speed(speed, state.speed),
        Transition::SelectAgent { agent_id } => {
            if let Some(id) = agent_id {
                state.ensure_agent(id);
            }
            state.selected_agent_id = agent_id;
        }
        Transition::PushLog { log } => note_eviction("logs", state.logs.push(log)),
        Transition::PushEvent { event } => note_eviction("events", state.events.push(event)),
        Transition::PushFeed { post } => note_eviction("feed", state.feed.push(post)),
        Transition::PushDiagnostic { line } => {
            note_eviction("diagnostics", state.diagnostics.push(line));
        }
        Transition::ApplyIntervention { record } => {
            if let Some(id) = record.target_agent_id {
                state.ensure_agent(id);
            }
            note_eviction("interventions", state.interventions.push(record));
        }
        Transition::SetConfig { patch } => set_config(state, patch),
        Transition::MutateAgentState { agent_id, patch } => {
            patch.apply_to(&mut state.ensure_agent(agent_id).state);
        }
        Transition::SeedAgent { agent_id, profile, state: agent_state } => {
            let agent = state.ensure_agent(agent_id);
            if let Some(profile) = profile {
                agent.profile = profile;
            }
            agent.state = agent_state;
        }
        Transition::SetGroups { groups } => state.groups = groups,
        Transition::CreateSnapshot { id, name, created_at } => {
            snapshot::create(state, id, name, created_at);
        }
        Transition::LoadSnapshot { id } => {
            snapshot::load(state, &id);
        }
        Transition::DeleteSnapshot { id } => {
            snapshot::delete(state, &id);
        }
        Transition::ClearSnapshots => snapshot::clear(state),
        Transition::Unknown => debug!("Ignoring unknown transition"),
    }
}

fn note_eviction(stream: &'static str, evicted: usize) {
    if evicted > 0 {
        trace!(stream, evicted, "Evicted oldest entries");
    }
}

fn set_tick(state: &mut WorldState, tick: u64) {
    state.tick = tick;
    if state.mode == Mode::Remote {
        return;
    }
    let seed = state.config.seed;
    for (&id, agent) in &mut state.agents {
        let derived = generator::state_at(seed, id, tick);
        agent.state.mood = derived.mood;
        agent.state.stance = derived.stance;
        agent.state.resources = derived.resources;
        agent.state.evidence = derived.evidence;
    }
    state.feed.retain_up_to(tick);
    state.events.retain_up_to(tick);
    state.logs.retain_up_to(tick);
    state.interventions.retain_up_to(tick);
}

fn set_config(state: &mut WorldState, patch: ConfigPatch) {
    if !state.config.merge(patch) {
        return;
    }
    let seed = state.config.seed;
    for (&id, agent) in &mut state.agents {
        agent.profile = generator::derive_profile(seed, id);
    }
    state.groups = generator::derive_groups(seed);
    debug!(seed, agents = state.agents.len(), "Seed changed, profiles regenerated");
}
