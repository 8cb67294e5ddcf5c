//! The world model: the single mutable value every source writes into.
//!
//! [`WorldState`] is only ever changed through
//! [`crate::transition::apply`]. Renderers read it through
//! [`WorldState::view`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buffer::BoundedBuffer;
use crate::config::{BufferLimits, WorldlineConfig};
use crate::generator;
use crate::snapshot::Snapshot;
use crate::types::{
    Agent, AgentId, AgentSample, AgentState, DiagnosticLine, FeedPost, GroupProfile,
    InterventionRecord, LogLine, Mode, SimConfig, SPEED_RANGE, TimelineEvent,
};

/// The complete world model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    /// Simulation parameters.
    pub config: SimConfig,
    /// Current tick, clamped to `[0, MAX_TICK]`.
    pub tick: u64,
    /// Whether the simulation is advancing.
    pub is_running: bool,
    /// Speed multiplier, clamped to [`SPEED_RANGE`].
    pub speed: f64,
    /// Agent currently inspected by the operator.
    pub selected_agent_id: Option<AgentId>,
    /// Local generator or remote authority.
    pub mode: Mode,
    /// Agents by id. Never shrinks.
    pub agents: BTreeMap<AgentId, Agent>,
    /// Group profiles by key.
    pub groups: BTreeMap<String, GroupProfile>,
    /// Social feed.
    pub feed: BoundedBuffer<FeedPost>,
    /// Timeline events.
    pub events: BoundedBuffer<TimelineEvent>,
    /// Simulation log.
    pub logs: BoundedBuffer<LogLine>,
    /// Operator interventions.
    pub interventions: BoundedBuffer<InterventionRecord>,
    /// Local failure/diagnostic lines.
    pub diagnostics: BoundedBuffer<DiagnosticLine>,
    /// Saved snapshots, oldest first.
    pub snapshots: Vec<Snapshot>,
    /// Snapshot most recently created or loaded.
    pub current_snapshot_id: Option<String>,
    /// Run number the next snapshot will get.
    pub next_run_number: u32,
}

impl WorldState {
    /// Build the initial world from a loaded configuration.
    ///
    /// In local mode the first `agent_count` agents are materialized
    /// immediately; in remote mode agents arrive through hydration.
    #[must_use]
    pub fn new(config: &WorldlineConfig) -> Self {
        let mode = if config.is_remote() { Mode::Remote } else { Mode::Local };
        Self::for_mode(config, mode)
    }

    /// Like [`WorldState::new`], with the mode chosen by the caller.
    #[must_use]
    pub fn for_mode(config: &WorldlineConfig, mode: Mode) -> Self {
        let mut state = Self::with_limits(config.simulation.config.clone(), &config.buffers, mode);
        state.speed = clamp_speed(config.simulation.initial_speed, 1.0);
        if mode == Mode::Local {
            for id in 1..=state.config.agent_count {
                state.ensure_agent(AgentId(id));
            }
        }
        state
    }

    /// An empty world with the given parameters and buffer limits.
    #[must_use]
    pub fn with_limits(config: SimConfig, limits: &BufferLimits, mode: Mode) -> Self {
        let groups = generator::derive_groups(config.seed);
        Self {
            config,
            tick: 0,
            is_running: false,
            speed: 1.0,
            selected_agent_id: None,
            mode,
            agents: BTreeMap::new(),
            groups,
            feed: BoundedBuffer::new(limits.max_feed),
            events: BoundedBuffer::new(limits.max_events),
            logs: BoundedBuffer::new(limits.max_logs),
            interventions: BoundedBuffer::new(limits.max_interventions),
            diagnostics: BoundedBuffer::new(limits.max_diagnostic),
            snapshots: Vec::new(),
            current_snapshot_id: None,
            next_run_number: 1,
        }
    }

    /// Return the agent with `id`, creating it from the generator if absent.
    pub fn ensure_agent(&mut self, id: AgentId) -> &mut Agent {
        let seed = self.config.seed;
        let tick = self.tick;
        let mode = self.mode;
        self.agents.entry(id).or_insert_with(|| Agent {
            profile: generator::derive_profile(seed, id),
            state: match mode {
                Mode::Local => generator::state_at(seed, id, tick),
                Mode::Remote => AgentState::default(),
            },
        })
    }

    /// Look up a snapshot by id.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// Read-only view for renderers.
    #[must_use]
    pub fn view(&self) -> WorldView<'_> {
        WorldView { state: self }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::with_limits(SimConfig::default(), &BufferLimits::default(), Mode::Local)
    }
}

/// Clamp `speed` to [`SPEED_RANGE`], falling back to `current` for NaN.
#[must_use]
pub fn clamp_speed(speed: f64, current: f64) -> f64 {
    if speed.is_nan() {
        current
    } else {
        speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
    }
}

// ---------------------------------------------------------------------------
// Read-only view
// ---------------------------------------------------------------------------

/// Borrowed, read-only access to the world for renderers.
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    state: &'a WorldState,
}

impl<'a> WorldView<'a> {
    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    /// Whether the simulation is advancing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    /// Speed multiplier.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    /// Local or remote.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Simulation parameters.
    #[must_use]
    pub fn config(&self) -> &'a SimConfig {
        &self.state.config
    }

    /// All agents.
    #[must_use]
    pub fn agents(&self) -> &'a BTreeMap<AgentId, Agent> {
        &self.state.agents
    }

    /// All group profiles.
    #[must_use]
    pub fn groups(&self) -> &'a BTreeMap<String, GroupProfile> {
        &self.state.groups
    }

    /// The selected agent, if it exists.
    #[must_use]
    pub fn selected_agent(&self) -> Option<&'a Agent> {
        self.state
            .selected_agent_id
            .and_then(|id| self.state.agents.get(&id))
    }

    /// Feed posts, oldest first.
    #[must_use]
    pub fn feed(&self) -> &'a BoundedBuffer<FeedPost> {
        &self.state.feed
    }

    /// Timeline events, oldest first.
    #[must_use]
    pub fn events(&self) -> &'a BoundedBuffer<TimelineEvent> {
        &self.state.events
    }

    /// Log lines, oldest first.
    #[must_use]
    pub fn logs(&self) -> &'a BoundedBuffer<LogLine> {
        &self.state.logs
    }

    /// Interventions, oldest first.
    #[must_use]
    pub fn interventions(&self) -> &'a BoundedBuffer<InterventionRecord> {
        &self.state.interventions
    }

    /// Diagnostic lines, oldest first.
    #[must_use]
    pub fn diagnostics(&self) -> &'a BoundedBuffer<DiagnosticLine> {
        &self.state.diagnostics
    }

    /// Saved snapshots.
    #[must_use]
    pub fn snapshots(&self) -> &'a [Snapshot] {
        &self.state.snapshots
    }

    /// Positions and derived values of the first `sample_agents` agents at the current tick.
    #[must_use]
    pub fn samples(&self) -> Vec<(AgentId, AgentSample)> {
        let config = &self.state.config;
        self.state
            .agents
            .keys()
            .take(config.sample_agents as usize)
            .map(|&id| {
                (
                    id,
                    generator::sample_agent(config.seed, id, self.state.tick, config.world_size),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_world_materializes_agents() {
        let config = WorldlineConfig::default();
        let world = WorldState::new(&config);
        assert_eq!(world.mode, Mode::Local);
        assert_eq!(world.agents.len(), config.simulation.config.agent_count as usize);
        assert!(!world.groups.is_empty());
    }

    #[test]
    fn remote_world_starts_empty() {
        let mut config = WorldlineConfig::default();
        config.remote.base_url = Some("http://localhost:8000".into());
        let world = WorldState::new(&config);
        assert_eq!(world.mode, Mode::Remote);
        assert!(world.agents.is_empty());
    }

    #[test]
    fn ensure_agent_is_lazy_and_stable() {
        let mut world = WorldState::default();
        let first = world.ensure_agent(AgentId(99)).clone();
        world.ensure_agent(AgentId(99)).state.mood = 0.25;
        assert_eq!(world.agents.len(), 1);
        assert_eq!(world.agents[&AgentId(99)].profile, first.profile);
        assert!((world.agents[&AgentId(99)].state.mood - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn speed_clamp_handles_nan() {
        assert!((clamp_speed(f64::NAN, 2.0) - 2.0).abs() < f64::EPSILON);
        assert!((clamp_speed(50.0, 1.0) - 10.0).abs() < f64::EPSILON);
        assert!((clamp_speed(0.0, 1.0) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn view_samples_respect_limit() {
        let mut world = WorldState::default();
        world.config.sample_agents = 3;
        for id in 1..=10 {
            world.ensure_agent(AgentId(id));
        }
        let samples = world.view().samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].0, AgentId(1));
    }
}
