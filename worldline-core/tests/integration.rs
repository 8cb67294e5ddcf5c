//! Integration tests: end-to-end world model scenarios.
//!
//! Seed changes, feed eviction, snapshot round-trips and a local simulator
//! run driven by a virtual clock.

use chrono::Utc;

use worldline_core::config::{SimulatorConfig, WorldlineConfig};
use worldline_core::scheduler::{Clock, Scheduler, TaskKind, VirtualClock};
use worldline_core::simulator::MockSimulator;
use worldline_core::snapshot;
use worldline_core::transition::{Transition, apply};
use worldline_core::types::{
    AgentId, ConfigPatch, EventKind, FeedPost, InterventionRecord, LogLevel, LogLine,
    TimelineEvent,
};
use worldline_core::world::WorldState;

fn post(n: usize) -> FeedPost {
    FeedPost {
        id: format!("post-{n}"),
        tick: 0,
        author_id: AgentId(1),
        author_name: "Ada".into(),
        emotion: 0.1,
        content: format!("post number {n}"),
        likes: 0,
    }
}

// ---------------------------------------------------------------------------
// Seed change
// ---------------------------------------------------------------------------

#[test]
fn seed_change_rewrites_profiles_and_keeps_state() {
    let mut state = WorldState::default();
    state = apply(state, Transition::SetConfig { patch: ConfigPatch::seed(100) });
    state.ensure_agent(AgentId(1));
    state.ensure_agent(AgentId(2));
    let before = state.clone();

    let after = apply(state, Transition::SetConfig { patch: ConfigPatch::seed(200) });

    assert_eq!(after.config.seed, 200);
    for id in [AgentId(1), AgentId(2)] {
        let old = &before.agents[&id];
        let new = &after.agents[&id];
        assert_ne!(old.profile, new.profile, "profile of {id} should be re-derived");
        assert_eq!(old.state.mood.to_bits(), new.state.mood.to_bits());
        assert_eq!(old.state.stance.to_bits(), new.state.stance.to_bits());
        assert_eq!(old.state.resources.to_bits(), new.state.resources.to_bits());
    }
}

// ---------------------------------------------------------------------------
// Eviction
// ---------------------------------------------------------------------------

#[test]
fn pushing_2001_posts_keeps_2_through_2001() {
    let mut state = WorldState::default();
    assert_eq!(state.feed.capacity(), 2000);
    for n in 1..=2001 {
        state = apply(state, Transition::PushFeed { post: post(n) });
    }
    assert_eq!(state.feed.len(), 2000);
    assert_eq!(state.feed.oldest().map(|p| p.id.as_str()), Some("post-2"));
    assert_eq!(state.feed.newest().map(|p| p.id.as_str()), Some("post-2001"));
}

// ---------------------------------------------------------------------------
// Snapshot round-trip
// ---------------------------------------------------------------------------

#[test]
fn snapshot_round_trip_restores_content() {
    let mut state = WorldState::new(&WorldlineConfig::default());
    state = apply(state, Transition::SetRunning { is_running: true });
    state = apply(state, Transition::SetTick { tick: 120 });
    state = apply(
        state,
        Transition::PushEvent {
            event: TimelineEvent {
                id: "e1".into(),
                tick: 100,
                kind: EventKind::Alert,
                title: "Protest".into(),
                agent_id: Some(AgentId(3)),
                payload: Some(serde_json::json!({"size": 40})),
            },
        },
    );
    state = apply(
        state,
        Transition::PushLog {
            log: LogLine {
                id: "l1".into(),
                tick: 101,
                level: LogLevel::Ok,
                text: "ok".into(),
                agent_id: None,
            },
        },
    );
    state = apply(
        state,
        Transition::ApplyIntervention {
            record: InterventionRecord {
                id: "i1".into(),
                tick: 110,
                command: "broadcast calm".into(),
                target_agent_id: None,
            },
        },
    );
    state = apply(state, Transition::PushFeed { post: post(1) });
    let before = state.clone();

    let state = apply(state, Transition::create_snapshot("checkpoint"));
    let id = state.current_snapshot_id.clone().expect("snapshot is current");
    let restored = apply(state, Transition::LoadSnapshot { id: id.clone() });

    assert_eq!(restored.tick, 0);
    assert!(!restored.is_running);
    assert_eq!(restored.agents, before.agents);
    assert_eq!(restored.groups, before.groups);
    assert_eq!(restored.logs, before.logs);
    assert_eq!(restored.events, before.events);
    assert_eq!(restored.feed, before.feed);
    assert_eq!(restored.interventions, before.interventions);
    assert_eq!(restored.config, before.config);
    assert_eq!(restored.current_snapshot_id, Some(id));
}

#[test]
fn snapshot_export_survives_clear_and_import() {
    let mut state = WorldState::default();
    state.ensure_agent(AgentId(4));
    snapshot::create(&mut state, "s1".into(), "before".into(), Utc::now());
    let json = snapshot::export_by_id(&state, "s1").expect("export");

    let state = apply(state, Transition::ClearSnapshots);
    assert!(state.snapshots.is_empty());
    assert!(state.current_snapshot_id.is_none());

    let imported = snapshot::import_json(&json).expect("import");
    assert_eq!(imported.id, "s1");
    assert!(imported.data.agents.contains_key(&AgentId(4)));
}

// ---------------------------------------------------------------------------
// Local simulator on a virtual clock
// ---------------------------------------------------------------------------

#[test]
fn simulator_driven_by_scheduler_advances_ticks() {
    let clock = VirtualClock::new(0);
    let config = SimulatorConfig::default();
    let mut scheduler = Scheduler::new();
    scheduler.every(TaskKind::TickAdvance, config.timer_period_ms, clock.now_ms());
    let mut sim = MockSimulator::new(config);

    let mut state = WorldState::new(&WorldlineConfig::default());
    state = apply(state, Transition::SetRunning { is_running: true });

    // 1 tick/s at speed 1: ten seconds of 100ms timer periods.
    for _ in 0..=100 {
        for task in scheduler.due(clock.now_ms()) {
            if task == TaskKind::TickAdvance {
                for t in sim.advance(&state, clock.now_ms()) {
                    state = apply(state, t);
                }
            }
        }
        clock.advance(100);
    }

    assert_eq!(state.tick, 10);
    assert!(!state.logs.is_empty());
    assert!(state.logs.iter().all(|l| l.tick <= 10));

    // Pausing stops the simulator.
    state = apply(state, Transition::SetRunning { is_running: false });
    clock.advance(5_000);
    assert!(sim.advance(&state, clock.now_ms()).is_empty());
    assert!(!sim.is_active());
}
