//! Property-based tests for the world model.
//!
//! Verifies boundedness, determinism, tick clamping and at-most-once
//! ingestion under random inputs.

use proptest::prelude::*;

use worldline_core::config::BufferLimits;
use worldline_core::dedup::DedupSet;
use worldline_core::generator;
use worldline_core::transition::{Transition, apply, clamp_tick};
use worldline_core::types::{
    AgentId, LogLevel, LogLine, MAX_TICK, Mode, SimConfig,
};
use worldline_core::world::WorldState;

fn small_world(max_logs: usize) -> WorldState {
    let limits = BufferLimits { max_logs, ..BufferLimits::default() };
    WorldState::with_limits(SimConfig::default(), &limits, Mode::Remote)
}

fn log(i: usize) -> LogLine {
    LogLine {
        id: format!("log-{i}"),
        tick: i as u64,
        level: LogLevel::Info,
        text: format!("line {i}"),
        agent_id: None,
    }
}

// ---------------------------------------------------------------------------
// Property: log buffer never exceeds its bound and keeps the newest items
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn logs_are_bounded_and_keep_newest(cap in 1..64usize, count in 0..300usize) {
        let mut state = small_world(cap);
        for i in 0..count {
            state = apply(state, Transition::PushLog { log: log(i) });
            prop_assert!(state.logs.len() <= cap);
        }
        let kept: Vec<String> = state.logs.iter().map(|l| l.id.clone()).collect();
        let expected: Vec<String> = (count.saturating_sub(cap)..count).map(|i| format!("log-{i}")).collect();
        prop_assert_eq!(kept, expected);
    }
}

// ---------------------------------------------------------------------------
// Property: derived agent values are pure functions of (seed, agent, tick)
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn derived_values_are_deterministic(seed in 0..1_000_000u64, id in 1..10_000u32, tick in 0..=MAX_TICK) {
        let a = generator::state_at(seed, AgentId(id), tick);
        let b = generator::state_at(seed, AgentId(id), tick);
        prop_assert_eq!(&a, &b);
        prop_assert!((-1.0..=1.0).contains(&a.mood));
        prop_assert!((-1.0..=1.0).contains(&a.stance));

        let p = generator::sample_agent(seed, AgentId(id), tick, 1000);
        let q = generator::sample_agent(seed, AgentId(id), tick, 1000);
        prop_assert_eq!(p, q);
    }
}

proptest! {
    #[test]
    fn scrubbing_there_and_back_reproduces_agents(t in 0..MAX_TICK, detour in 0..MAX_TICK) {
        let mut state = WorldState::default();
        for id in 1..=5 {
            state.ensure_agent(AgentId(id));
        }
        let there = apply(state, Transition::SetTick { tick: t as i64 });
        let snapshot = there.agents.clone();
        let away = apply(there, Transition::SetTick { tick: detour as i64 });
        let back = apply(away, Transition::SetTick { tick: t as i64 });
        prop_assert_eq!(back.agents, snapshot);
    }
}

// ---------------------------------------------------------------------------
// Property: set_tick always lands in [0, MAX_TICK]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn set_tick_is_clamped(tick in any::<i64>()) {
        let state = apply(small_world(4), Transition::SetTick { tick });
        prop_assert!(state.tick <= MAX_TICK);
        prop_assert_eq!(state.tick, clamp_tick(tick));
        if tick < 0 {
            prop_assert_eq!(state.tick, 0);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: arbitrary re-delivery never claims an id twice
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn dedup_claims_each_id_at_most_once(ids in proptest::collection::vec(0..50u32, 0..400)) {
        let mut set = DedupSet::new(1024);
        let mut state = small_world(4096);
        for id in &ids {
            let key = format!("log-{id}");
            if set.claim(&key) {
                state = apply(state, Transition::PushLog { log: log(*id as usize) });
            }
        }
        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(state.logs.len(), distinct.len());
    }
}
