//! User intents: toggle run, set speed, edit an agent, apply intervention.
//!
//! Local changes are applied optimistically. Anything that needs the
//! remote authority's agreement returns a pending value that knows how to
//! compensate if the authority says no; the caller decides whether to.

use std::fmt;

use tracing::{info, warn};

use worldline_core::metrics::SyncCounters;
use worldline_core::transition::{Transition, apply_in_place};
use worldline_core::types::{
    AgentId, AgentState, AgentStatePatch, EventKind, InterventionRecord, TimelineEvent,
};
use worldline_core::world::WorldState;
use worldline_remote::client::RemoteResult;
use worldline_remote::types::{InterventionRequest, StatePatch};

use crate::coordinator::SyncCoordinator;
use crate::diagnostics;

/// Result of an intent that has no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// The change stands.
    Applied,
    /// The change was refused and rolled back; carries the reason.
    Rejected(String),
}

/// Result of applying an intervention.
#[derive(Debug, Clone, PartialEq)]
pub enum InterventionOutcome {
    /// The intervention is in the world.
    Applied(InterventionRecord),
    /// The authority refused; the world only gained a diagnostic line.
    Rejected(String),
}

impl InterventionOutcome {
    /// Whether the intervention landed.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

// ---------------------------------------------------------------------------
// Run / speed
// ---------------------------------------------------------------------------

/// A local state change awaiting the remote authority's confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingChange {
    /// `is_running` was flipped from `previous`.
    Running { previous: bool },
    /// `speed` was changed from `previous`.
    Speed { previous: f64 },
    /// `tick` was moved; scrubbing is not rolled back.
    Tick,
}

impl PendingChange {
    /// The `PATCH /api/state` body announcing the change now in `world`.
    #[must_use]
    pub fn patch(&self, world: &WorldState) -> StatePatch {
        match self {
            Self::Running { .. } => StatePatch { is_running: Some(world.is_running), ..StatePatch::default() },
            Self::Speed { .. } => StatePatch { speed: Some(world.speed), ..StatePatch::default() },
            Self::Tick => StatePatch { tick: Some(world.tick), ..StatePatch::default() },
        }
    }

    /// Settle the change against the authority's answer, undoing it on
    /// failure and leaving a diagnostic line.
    pub fn settle(self, result: RemoteResult<()>, world: &mut WorldState) -> IntentOutcome {
        let Err(err) = result else {
            return IntentOutcome::Applied;
        };
        match self {
            Self::Running { previous } => {
                apply_in_place(world, Transition::SetRunning { is_running: previous });
            }
            Self::Speed { previous } => apply_in_place(world, Transition::SetSpeed { speed: previous }),
            Self::Tick => {}
        }
        warn!(change = %self, error = %err, "Remote authority refused state change, rolled back");
        diagnostics::report(world, format!("Could not {self}: {err}"));
        IntentOutcome::Rejected(err.to_string())
    }
}

impl fmt::Display for PendingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running { previous: true } => f.write_str("pause the simulation"),
            Self::Running { previous: false } => f.write_str("resume the simulation"),
            Self::Speed { .. } => f.write_str("change speed"),
            Self::Tick => f.write_str("move the tick pointer"),
        }
    }
}

/// Flip `is_running`.
pub fn toggle_run(world: &mut WorldState) -> PendingChange {
    let previous = world.is_running;
    apply_in_place(world, Transition::SetRunning { is_running: !previous });
    info!(running = !previous, "Run toggled");
    PendingChange::Running { previous }
}

/// Change the speed multiplier (clamped).
pub fn set_speed(world: &mut WorldState, speed: f64) -> PendingChange {
    let previous = world.speed;
    apply_in_place(world, Transition::SetSpeed { speed });
    PendingChange::Speed { previous }
}

/// Move the tick pointer (clamped).
pub fn set_tick(world: &mut WorldState, tick: i64) -> PendingChange {
    apply_in_place(world, Transition::SetTick { tick });
    PendingChange::Tick
}

// ---------------------------------------------------------------------------
// Agent edits
// ---------------------------------------------------------------------------

/// An agent-state edit awaiting the remote authority's confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAgentEdit {
    agent_id: AgentId,
    previous: AgentState,
    patch: AgentStatePatch,
}

impl PendingAgentEdit {
    /// The edited agent.
    #[must_use]
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// The `PATCH /api/agents/{id}/state` body.
    #[must_use]
    pub fn patch(&self) -> AgentStatePatch {
        self.patch.clone()
    }

    /// Settle the edit, restoring the agent's previous state on failure.
    pub fn settle(self, result: RemoteResult<()>, world: &mut WorldState) -> IntentOutcome {
        let Err(err) = result else {
            return IntentOutcome::Applied;
        };
        let agent_id = self.agent_id;
        apply_in_place(world, Transition::SeedAgent { agent_id, profile: None, state: self.previous });
        warn!(agent = agent_id.0, error = %err, "Remote authority refused agent edit, rolled back");
        diagnostics::report(world, format!("Could not update agent {}: {err}", agent_id.0));
        IntentOutcome::Rejected(err.to_string())
    }
}

/// Patch one agent's state, remembering what it was.
pub fn edit_agent(world: &mut WorldState, agent_id: AgentId, patch: AgentStatePatch) -> PendingAgentEdit {
    let previous = world.ensure_agent(agent_id).state.clone();
    apply_in_place(world, Transition::MutateAgentState { agent_id, patch: patch.clone() });
    PendingAgentEdit { agent_id, previous, patch }
}

// ---------------------------------------------------------------------------
// Interventions
// ---------------------------------------------------------------------------

/// Apply an intervention with no remote authority.
///
/// The record and a matching timeline event are stamped with the current
/// tick.
pub fn apply_local_intervention(
    world: &mut WorldState,
    command: &str,
    target_agent_id: Option<AgentId>,
    counters: &SyncCounters,
) -> InterventionOutcome {
    let command = command.trim();
    if command.is_empty() {
        return reject(world, "empty command", counters);
    }
    let suffix = uuid::Uuid::new_v4().simple();
    let record = InterventionRecord {
        id: format!("int-{suffix}"),
        tick: world.tick,
        command: command.to_string(),
        target_agent_id,
    };
    apply_in_place(world, Transition::ApplyIntervention { record: record.clone() });
    apply_in_place(
        world,
        Transition::PushEvent {
            event: TimelineEvent {
                id: format!("evt-int-{suffix}"),
                tick: world.tick,
                kind: EventKind::Intervention,
                title: command.to_string(),
                agent_id: target_agent_id,
                payload: None,
            },
        },
    );
    SyncCounters::bump(&counters.interventions_applied);
    info!(id = %record.id, tick = record.tick, "Intervention applied locally");
    InterventionOutcome::Applied(record)
}

/// Body for `POST /api/intervention`, or the reason it cannot be sent.
pub fn intervention_request(
    world: &WorldState,
    command: &str,
    target_agent_id: Option<AgentId>,
) -> Result<InterventionRequest, String> {
    let command = command.trim();
    if command.is_empty() {
        return Err("empty command".to_string());
    }
    Ok(InterventionRequest { tick: world.tick, command: command.to_string(), target_agent_id })
}

/// Settle a remote intervention.
///
/// An accepted record is claimed in the intervention dedup set before it is
/// applied, so the next poll returning it is a duplicate. A refusal leaves
/// the world untouched apart from a diagnostic line.
pub fn settle_intervention(
    result: RemoteResult<InterventionRecord>,
    world: &mut WorldState,
    coordinator: &mut SyncCoordinator,
    counters: &SyncCounters,
) -> InterventionOutcome {
    match result {
        Ok(record) => {
            coordinator.ingest_accepted(record.clone(), world);
            SyncCounters::bump(&counters.interventions_applied);
            info!(id = %record.id, tick = record.tick, "Intervention accepted");
            InterventionOutcome::Applied(record)
        }
        Err(err) => reject(world, &err.to_string(), counters),
    }
}

/// Record a refused intervention.
pub fn reject(world: &mut WorldState, reason: &str, counters: &SyncCounters) -> InterventionOutcome {
    SyncCounters::bump(&counters.interventions_rejected);
    warn!(reason, "Intervention rejected");
    diagnostics::report(world, format!("Intervention rejected: {reason}"));
    InterventionOutcome::Rejected(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use worldline_remote::error::RemoteError;

    #[test]
    fn failed_toggle_is_compensated() {
        let mut world = WorldState::default();
        let pending = toggle_run(&mut world);
        assert!(world.is_running);
        let outcome = pending.settle(Err(RemoteError::Unavailable("offline".into())), &mut world);
        assert!(matches!(outcome, IntentOutcome::Rejected(_)));
        assert!(!world.is_running);
        assert_eq!(world.diagnostics.len(), 1);
    }

    #[test]
    fn confirmed_speed_sticks() {
        let mut world = WorldState::default();
        let pending = set_speed(&mut world, 50.0);
        assert_eq!(pending.patch(&world).speed, Some(10.0));
        assert_eq!(pending.settle(Ok(()), &mut world), IntentOutcome::Applied);
        assert!((world.speed - 10.0).abs() < f64::EPSILON);
        assert!(world.diagnostics.is_empty());
    }

    #[test]
    fn refused_agent_edit_restores_previous_state() {
        let mut world = WorldState::default();
        let agent = world.ensure_agent(AgentId(3));
        agent.state.mood = 0.2;
        agent.state.last_action = "idle".into();
        let pending = edit_agent(
            &mut world,
            AgentId(3),
            AgentStatePatch { mood: Some(-0.6), last_action: Some("protest".into()), ..AgentStatePatch::default() },
        );
        assert!((world.agents[&AgentId(3)].state.mood + 0.6).abs() < f64::EPSILON);
        assert_eq!(pending.patch().last_action.as_deref(), Some("protest"));

        let outcome = pending.settle(Err(RemoteError::Unavailable("offline".into())), &mut world);
        assert!(matches!(outcome, IntentOutcome::Rejected(_)));
        let state = &world.agents[&AgentId(3)].state;
        assert!((state.mood - 0.2).abs() < f64::EPSILON);
        assert_eq!(state.last_action, "idle");
        assert_eq!(world.diagnostics.len(), 1);
    }

    #[test]
    fn local_intervention_records_and_logs_event() {
        let mut world = WorldState::default();
        let counters = SyncCounters::new();
        let outcome = apply_local_intervention(&mut world, "  raise taxes ", Some(AgentId(7)), &counters);
        let InterventionOutcome::Applied(record) = outcome else {
            panic!("expected applied");
        };
        assert_eq!(record.command, "raise taxes");
        assert_eq!(world.interventions.len(), 1);
        assert_eq!(world.events.len(), 1);
        assert!(world.agents.contains_key(&AgentId(7)));
        assert_eq!(counters.snapshot().interventions_applied, 1);
    }

    #[test]
    fn rejected_intervention_changes_nothing_but_diagnostics() {
        let mut world = WorldState::default();
        let counters = Arc::new(SyncCounters::new());
        let mut coordinator = SyncCoordinator::new(16, Arc::clone(&counters));
        let before = world.interventions.len();
        let outcome = settle_intervention(
            Err(RemoteError::Rejected("unknown agent".into())),
            &mut world,
            &mut coordinator,
            &counters,
        );
        assert_eq!(outcome, InterventionOutcome::Rejected("Remote rejected the request: unknown agent".into()));
        assert_eq!(world.interventions.len(), before);
        assert_eq!(world.diagnostics.len(), 1);
        assert_eq!(counters.snapshot().interventions_rejected, 1);
    }

    #[test]
    fn empty_command_is_refused_before_sending() {
        let world = WorldState::default();
        assert!(intervention_request(&world, "   ", None).is_err());
    }
}
