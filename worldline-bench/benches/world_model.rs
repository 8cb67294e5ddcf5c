//! Worldline benchmark suite
//!
//! Hot paths of the world model:
//!   transition_push_feed_full_buffer ... one push into a saturated feed
//!   simulator_advance_one_tick ........ mock simulator crossing a tick
//!   scrub_rewind_full_streams ......... set_tick back over full buffers
//!   ingest_poll_window_duplicates ..... re-polling an already claimed window

use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use worldline_core::config::{SimulatorConfig, WorldlineConfig};
use worldline_core::metrics::SyncCounters;
use worldline_core::simulator::MockSimulator;
use worldline_core::transition::{Transition, apply_in_place};
use worldline_core::types::{AgentId, EventKind, FeedPost, LogLevel, LogLine, Mode, TimelineEvent};
use worldline_core::world::WorldState;
use worldline_remote::types::{RemoteBatch, RemoteWorldState};
use worldline_session::SyncCoordinator;

fn make_post(i: u64) -> FeedPost {
    FeedPost {
        id: format!("post-{i}"),
        tick: i / 4,
        author_id: AgentId(1 + (i % 30) as u32),
        author_name: "Bench".to_string(),
        emotion: 0.0,
        content: format!("Post number {i}"),
        likes: 0,
    }
}

/// A local world whose feed, events and logs are at capacity.
fn saturated_world() -> WorldState {
    let mut world = WorldState::new(&WorldlineConfig::default());
    let cap = world.feed.capacity() as u64;
    for i in 0..cap {
        apply_in_place(&mut world, Transition::PushFeed { post: make_post(i) });
    }
    for i in 0..world.events.capacity() as u64 {
        let event = TimelineEvent {
            id: format!("evt-{i}"),
            tick: i / 5,
            kind: EventKind::AgentAction,
            title: "moved".to_string(),
            agent_id: None,
            payload: None,
        };
        apply_in_place(&mut world, Transition::PushEvent { event });
    }
    for i in 0..world.logs.capacity() as u64 {
        let log = LogLine { id: format!("log-{i}"), tick: i / 8, level: LogLevel::Info, text: String::new(), agent_id: None };
        apply_in_place(&mut world, Transition::PushLog { log });
    }
    apply_in_place(&mut world, Transition::SetTick { tick: 500 });
    world
}

fn bench_push_full_buffer(c: &mut Criterion) {
    let mut world = saturated_world();
    let mut next = world.feed.capacity() as u64;
    c.bench_function("transition_push_feed_full_buffer", |b| {
        b.iter(|| {
            next += 1;
            apply_in_place(&mut world, Transition::PushFeed { post: black_box(make_post(next)) });
        });
    });
}

fn bench_simulator_tick(c: &mut Criterion) {
    let mut world = WorldState::new(&WorldlineConfig::default());
    apply_in_place(&mut world, Transition::SetRunning { is_running: true });
    let mut sim = MockSimulator::new(SimulatorConfig::default());
    let mut now = 0;
    sim.advance(&world, now);
    c.bench_function("simulator_advance_one_tick", |b| {
        b.iter(|| {
            now += 1000;
            for transition in sim.advance(black_box(&world), now) {
                apply_in_place(&mut world, transition);
            }
        });
    });
}

fn bench_scrub_rewind(c: &mut Criterion) {
    let world = saturated_world();
    c.bench_function("scrub_rewind_full_streams", |b| {
        b.iter_batched(
            || world.clone(),
            |mut w| {
                apply_in_place(&mut w, Transition::SetTick { tick: black_box(100) });
                w
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_duplicate_poll(c: &mut Criterion) {
    let config = WorldlineConfig::default();
    let mut world = WorldState::for_mode(&config, Mode::Remote);
    let mut coordinator = SyncCoordinator::new(config.dedup_capacity(), Arc::new(SyncCounters::new()));
    let window = || RemoteBatch {
        state: RemoteWorldState { tick: 1_000, speed: 1.0, ..RemoteWorldState::default() },
        feed: (0..200u64).rev().map(make_post).collect(),
        ..RemoteBatch::default()
    };
    if let Some(ticket) = coordinator.begin_hydrate() {
        coordinator.finish_hydrate(ticket, Ok(window()), &mut world);
    }
    c.bench_function("ingest_poll_window_duplicates", |b| {
        b.iter_batched(
            window,
            |batch| {
                if let Some(ticket) = coordinator.begin_poll() {
                    black_box(coordinator.finish_poll(ticket, Ok(batch), &mut world));
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_push_full_buffer,
    bench_simulator_tick,
    bench_scrub_rewind,
    bench_duplicate_poll,
);
criterion_main!(benches);
