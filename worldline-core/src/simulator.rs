//! Local mock simulator.
//!
//! Fabricates world evolution when no remote authority is configured. Each
//! timer period the driver calls [`MockSimulator::advance`] with the current
//! clock reading; elapsed wall time is converted to fractional ticks
//! (`ticks_per_second * speed`), accumulated, and floored:
//!
//! ```text
//!  elapsed_ms ──× tps × speed──▶ acc ──÷1000, floor──▶ tick
//!                               │
//!          unchanged? ──────────┴──▶ nothing to do
//!          advanced?  ──▶ set_tick + ≤N mutations + scheduled post/event/log
//! ```
//!
//! The simulator only proposes transitions; the caller applies them.

use tracing::{debug, trace};

use crate::config::SimulatorConfig;
use crate::generator::{self, world_unit};
use crate::transition::Transition;
use crate::types::{
    AgentId, AgentStatePatch, EventKind, FeedPost, LogLevel, LogLine, MAX_TICK, Mode,
    TimelineEvent,
};
use crate::world::WorldState;

const POST_TEMPLATES: &[&str] = &[
    "Can't stop thinking about what happened today.",
    "Anyone else following this? Things are moving fast.",
    "Not convinced by the latest announcement.",
    "Grateful for the people in my neighbourhood right now.",
    "This is exactly what I warned about last week.",
    "Sharing this because more people need to see it.",
];

const ACTIONS: &[&str] = &["post", "reply", "like", "share", "follow", "lurk"];

/// Accumulator-driven tick source plus scheduled content.
#[derive(Debug, Clone)]
pub struct MockSimulator {
    config: SimulatorConfig,
    active: bool,
    /// Tick at which the current run started.
    base_tick: u64,
    /// Ticks elapsed since `base_tick`, scaled by 1000 so whole
    /// millisecond steps accumulate without rounding drift.
    acc: f64,
    last_ms: Option<u64>,
    /// Monotonic counter so generated ids stay unique across rewinds.
    sequence: u64,
}

impl MockSimulator {
    /// Create a stopped simulator.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            active: false,
            base_tick: 0,
            acc: 0.0,
            last_ms: None,
            sequence: 0,
        }
    }

    /// Whether the simulator is currently producing ticks.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start advancing from `tick`. The first `advance` call only records
    /// the clock reading.
    pub fn start(&mut self, tick: u64) {
        self.active = true;
        self.base_tick = tick;
        self.acc = 0.0;
        self.last_ms = None;
        debug!(tick, "Mock simulator started");
    }

    /// Stop and discard any partial tick.
    pub fn stop(&mut self) {
        if self.active {
            debug!(tick = self.current_tick(), "Mock simulator stopped");
        }
        self.active = false;
        self.acc = 0.0;
        self.last_ms = None;
    }

    /// Advance by the time elapsed since the previous call.
    ///
    /// Starts or stops itself to follow `state.is_running`, and never runs
    /// in remote mode. Returns the transitions to apply, oldest first.
    pub fn advance(&mut self, state: &WorldState, now_ms: u64) -> Vec<Transition> {
        if state.mode == Mode::Remote || !state.is_running {
            self.stop();
            return Vec::new();
        }
        if !self.active {
            self.start(state.tick);
        }
        // An external set_tick (scrub, snapshot load) rebases the run.
        let expected = self.current_tick();
        if expected != state.tick {
            self.base_tick = state.tick;
            self.acc = 0.0;
        }

        let Some(last) = self.last_ms.replace(now_ms) else {
            return Vec::new();
        };
        let elapsed_ms = now_ms.saturating_sub(last) as f64;
        let rate = state.config.ticks_per_second.max(0.0) * state.speed;
        self.acc += elapsed_ms * rate;

        let next = self.current_tick().min(MAX_TICK);
        if next == state.tick {
            return Vec::new();
        }
        trace!(from = state.tick, to = next, "Tick boundary crossed");

        let mut out = vec![Transition::SetTick { tick: next as i64 }];
        self.mutations(state, next, &mut out);
        self.scheduled_content(state, next, &mut out);
        if next == MAX_TICK {
            out.push(Transition::SetRunning { is_running: false });
        }
        out
    }

    fn current_tick(&self) -> u64 {
        self.base_tick.saturating_add((self.acc / 1000.0).floor() as u64)
    }

    fn agent_count(state: &WorldState) -> u32 {
        state.config.agent_count.max(1)
    }

    fn pick_agent(state: &WorldState, tick: u64, salt: f64) -> AgentId {
        let n = Self::agent_count(state);
        let unit = world_unit(state.config.seed, tick, salt);
        AgentId(1 + ((unit * f64::from(n)) as u32).min(n - 1))
    }

    fn mutations(&self, state: &WorldState, tick: u64, out: &mut Vec<Transition>) {
        let max = self.config.max_agent_mutations_per_tick;
        if max == 0 {
            return;
        }
        let count = 1 + (world_unit(state.config.seed, tick, 5.0) * max as f64) as usize;
        for i in 0..count.min(max) {
            let salt = 10.0 + i as f64 * 1.7;
            let agent_id = Self::pick_agent(state, tick, salt);
            let unit = world_unit(state.config.seed, tick, salt + 0.5);
            let action = ACTIONS[((unit * ACTIONS.len() as f64) as usize).min(ACTIONS.len() - 1)];
            out.push(Transition::MutateAgentState {
                agent_id,
                patch: AgentStatePatch {
                    last_action: Some(action.to_string()),
                    ..AgentStatePatch::default()
                },
            });
        }
    }

    fn next_id(&mut self, kind: &str, tick: u64) -> String {
        self.sequence += 1;
        format!("sim-{kind}-{tick}-{}", self.sequence)
    }

    fn scheduled_content(&mut self, state: &WorldState, tick: u64, out: &mut Vec<Transition>) {
        let seed = state.config.seed;
        if every(tick, self.config.post_every_ticks) {
            let author = Self::pick_agent(state, tick, 31.0);
            let (name, mood) = state.agents.get(&author).map_or_else(
                || (generator::derive_profile(seed, author).name, 0.0),
                |a| (a.profile.name.clone(), a.state.mood),
            );
            let unit = world_unit(seed, tick, 37.0);
            let content = POST_TEMPLATES
                [((unit * POST_TEMPLATES.len() as f64) as usize).min(POST_TEMPLATES.len() - 1)];
            out.push(Transition::PushFeed {
                post: FeedPost {
                    id: self.next_id("post", tick),
                    tick,
                    author_id: author,
                    author_name: name,
                    emotion: mood,
                    content: content.to_string(),
                    likes: (world_unit(seed, tick, 41.0) * 50.0) as u32,
                },
            });
        }
        if every(tick, self.config.event_every_ticks) {
            let agent = Self::pick_agent(state, tick, 43.0);
            out.push(Transition::PushEvent {
                event: TimelineEvent {
                    id: self.next_id("event", tick),
                    tick,
                    kind: EventKind::AgentAction,
                    title: format!("Agent {agent} acted"),
                    agent_id: Some(agent),
                    payload: None,
                },
            });
        }
        if every(tick, self.config.log_every_ticks) {
            out.push(Transition::PushLog {
                log: LogLine {
                    id: self.next_id("log", tick),
                    tick,
                    level: LogLevel::Info,
                    text: format!("tick {tick} advanced"),
                    agent_id: None,
                },
            });
        }
    }
}

fn every(tick: u64, period: u64) -> bool {
    period > 0 && tick % period == 0
}
