//! End-to-end synchronization against an in-memory remote authority.
//!
//! Time is a [`VirtualClock`]; background requests run on the test runtime
//! and are folded back in with `Session::settle`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use worldline_core::config::WorldlineConfig;
use worldline_core::generator;
use worldline_core::scheduler::{TaskKind, VirtualClock};
use worldline_core::types::{
    AgentId, AgentProfile, AgentState, AgentStatePatch, ConfigPatch, FeedPost, GroupProfile,
    InterventionRecord, LogLevel, LogLine, TimelineEvent,
};
use worldline_remote::client::{RemoteQuery, RemoteResult};
use worldline_remote::error::RemoteError;
use worldline_remote::socket::SocketEvent;
use worldline_remote::types::{
    InterventionRequest, OutboundMessage, PushMessage, RemoteAgentEntry, RemoteWorldState, StatePatch,
};
use worldline_session::{Command, IntentOutcome, InterventionOutcome, Session, SyncPhase};

// ---------------------------------------------------------------------------
// Fake authority
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Authority {
    state: RemoteWorldState,
    agents: Vec<AgentProfile>,
    feed: Vec<FeedPost>,
    logs: Vec<LogLine>,
    interventions: Vec<InterventionRecord>,
    failing_state_calls: usize,
    state_calls: usize,
    reject_interventions: Option<String>,
    refuse_state_patches: bool,
    config_patches: Vec<ConfigPatch>,
    agent_patches: Vec<(AgentId, AgentStatePatch)>,
}

#[derive(Debug, Clone, Default)]
struct FakeRemote {
    inner: Arc<Mutex<Authority>>,
}

impl FakeRemote {
    fn at_tick(tick: u64) -> Self {
        let remote = Self::default();
        remote.with(|a| {
            a.state.tick = tick;
            a.state.is_running = true;
            a.state.speed = 1.0;
            let seed = a.state.config.seed;
            for id in 1..=3 {
                let id = AgentId(id);
                a.agents.push(generator::derive_profile(seed, id));
                a.state.agents.insert(id, RemoteAgentEntry { state: AgentState { mood: 0.25, ..AgentState::default() } });
            }
        });
        remote
    }

    fn with<T>(&self, f: impl FnOnce(&mut Authority) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

impl RemoteQuery for FakeRemote {
    async fn list_agents(&self) -> RemoteResult<Vec<AgentProfile>> {
        Ok(self.with(|a| a.agents.clone()))
    }

    async fn get_state(&self) -> RemoteResult<RemoteWorldState> {
        self.with(|a| {
            a.state_calls += 1;
            if a.failing_state_calls > 0 {
                a.failing_state_calls -= 1;
                return Err(RemoteError::Unavailable("connection refused".into()));
            }
            Ok(a.state.clone())
        })
    }

    async fn list_groups(&self) -> RemoteResult<Vec<GroupProfile>> {
        Ok(Vec::new())
    }

    async fn list_feed(&self, limit: usize) -> RemoteResult<Vec<FeedPost>> {
        Ok(self.with(|a| a.feed.iter().take(limit).cloned().collect()))
    }

    async fn list_events(&self, _limit: usize) -> RemoteResult<Vec<TimelineEvent>> {
        Ok(Vec::new())
    }

    async fn list_logs(&self, limit: usize) -> RemoteResult<Vec<LogLine>> {
        Ok(self.with(|a| a.logs.iter().take(limit).cloned().collect()))
    }

    async fn list_interventions(&self, limit: usize) -> RemoteResult<Vec<InterventionRecord>> {
        Ok(self.with(|a| a.interventions.iter().take(limit).cloned().collect()))
    }

    async fn apply_intervention(&self, request: InterventionRequest) -> RemoteResult<InterventionRecord> {
        self.with(|a| {
            if let Some(reason) = &a.reject_interventions {
                return Err(RemoteError::Rejected(reason.clone()));
            }
            let record = InterventionRecord {
                id: format!("int-{}", a.interventions.len() + 1),
                tick: request.tick,
                command: request.command,
                target_agent_id: request.target_agent_id,
            };
            a.interventions.insert(0, record.clone());
            Ok(record)
        })
    }

    async fn patch_state(&self, patch: StatePatch) -> RemoteResult<()> {
        self.with(|a| {
            if a.refuse_state_patches {
                return Err(RemoteError::Status { status: 409, body: "simulation locked".into() });
            }
            if let Some(running) = patch.is_running {
                a.state.is_running = running;
            }
            Ok(())
        })
    }

    async fn patch_config(&self, patch: ConfigPatch) -> RemoteResult<()> {
        self.with(|a| a.config_patches.push(patch));
        Ok(())
    }

    async fn patch_agent_state(&self, agent_id: AgentId, patch: AgentStatePatch) -> RemoteResult<()> {
        self.with(|a| {
            if a.refuse_state_patches {
                return Err(RemoteError::Status { status: 409, body: "simulation locked".into() });
            }
            a.agent_patches.push((agent_id, patch));
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn post(id: &str, tick: u64) -> FeedPost {
    FeedPost {
        id: id.into(),
        tick,
        author_id: AgentId(1),
        author_name: "Ana".into(),
        emotion: 0.1,
        content: format!("post {id}"),
        likes: 0,
    }
}

fn log(id: &str, tick: u64) -> LogLine {
    LogLine { id: id.into(), tick, level: LogLevel::Info, text: id.into(), agent_id: None }
}

fn remote_config() -> WorldlineConfig {
    let mut config = WorldlineConfig::default();
    config.remote.base_url = Some("http://authority.test".into());
    config
}

fn remote_session(remote: &FakeRemote, clock: &VirtualClock) -> Session<FakeRemote, VirtualClock> {
    Session::new(remote_config(), Some(remote.clone()), clock.clone()).detached_push()
}

fn unsubscribe_posts() -> Command {
    Command::Unsubscribe { event_types: vec!["post".into()], agent_ids: vec![AgentId(2)] }
}

async fn hydrated(remote: &FakeRemote, clock: &VirtualClock) -> Session<FakeRemote, VirtualClock> {
    let mut session = remote_session(remote, clock);
    session.start();
    session.run_due();
    session.settle().await;
    assert!(session.coordinator().is_hydrated());
    session
}

fn frame(message: &PushMessage) -> SocketEvent {
    SocketEvent::Text { generation: 1, text: serde_json::to_string(message).expect("encode") }
}

fn feed_ids(session: &Session<FakeRemote, VirtualClock>) -> Vec<String> {
    session.world().feed.iter().map(|p| p.id.clone()).collect()
}

// ---------------------------------------------------------------------------
// Hydration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hydration_seeds_world_from_authority() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| {
        a.feed = vec![post("p3", 14), post("p2", 9), post("p1", 2)];
        a.logs = vec![log("l1", 3)];
    });
    let clock = VirtualClock::new(0);
    let session = hydrated(&remote, &clock).await;

    let world = session.world();
    assert_eq!(world.tick, 10);
    assert!(world.is_running);
    assert_eq!(world.agents.len(), 3);
    assert!((world.agents[&AgentId(2)].state.mood - 0.25).abs() < f64::EPSILON);
    assert_eq!(feed_ids(&session), vec!["p1", "p2"], "oldest first, nothing past the remote tick");
    assert_eq!(world.logs.len(), 1);
    assert!(!session.scheduler().is_scheduled(TaskKind::HydrateRetry));
}

#[tokio::test]
async fn hydration_retries_until_success() {
    let remote = FakeRemote::at_tick(4);
    remote.with(|a| a.failing_state_calls = 2);
    let clock = VirtualClock::new(0);
    let mut session = remote_session(&remote, &clock);
    session.start();

    for _ in 0..2 {
        session.run_due();
        session.settle().await;
        assert_eq!(session.coordinator().phase(), SyncPhase::Hydrating);
        assert!(session.world().agents.is_empty(), "failed attempts leave the world untouched");
        clock.advance(3_000);
    }
    session.run_due();
    session.settle().await;

    assert!(session.coordinator().is_hydrated());
    assert_eq!(session.world().diagnostics.len(), 2);
    let counters = session.counters().snapshot();
    assert_eq!(counters.hydrate_attempts, 3);
    assert_eq!(counters.hydrate_failures, 2);
}

#[tokio::test]
async fn overlapping_hydration_attempts_collapse() {
    let remote = FakeRemote::at_tick(1);
    let clock = VirtualClock::new(0);
    let mut session = remote_session(&remote, &clock);
    session.start();
    session.run_due();
    clock.advance(3_000);
    session.run_due();
    assert_eq!(session.in_flight(), 1);
    session.settle().await;
    assert_eq!(remote.with(|a| a.state_calls), 1);
}

#[tokio::test]
async fn hydration_result_after_teardown_is_discarded() {
    let remote = FakeRemote::at_tick(5);
    remote.with(|a| a.feed = vec![post("p1", 1)]);
    let clock = VirtualClock::new(0);
    let mut session = remote_session(&remote, &clock);
    session.start();
    session.run_due();
    session.teardown();
    session.settle().await;

    assert!(session.world().agents.is_empty());
    assert!(session.world().feed.is_empty());
    assert_eq!(session.scheduler().next_deadline(), None);
}

// ---------------------------------------------------------------------------
// Idempotent ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_and_push_deliver_each_item_once() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| a.feed = vec![post("p1", 3)]);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;

    session.handle_socket(SocketEvent::Opened { generation: 1 });
    let pushed = PushMessage::PostCreated { post: post("p2", 8) };
    session.handle_socket(frame(&pushed));
    session.handle_socket(frame(&pushed));

    remote.with(|a| a.feed.insert(0, post("p2", 8)));
    clock.advance(2_000);
    session.run_due();
    session.settle().await;

    assert_eq!(feed_ids(&session), vec!["p1", "p2"]);
    let counters = session.counters().snapshot();
    assert_eq!(counters.polls, 1);
    assert!(counters.duplicates_skipped >= 3, "p1 re-polled, p2 re-pushed and re-polled");
}

#[tokio::test]
async fn push_ahead_of_remote_tick_is_picked_up_by_next_poll() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    session.handle_socket(SocketEvent::Opened { generation: 1 });

    session.handle_socket(frame(&PushMessage::PostCreated { post: post("early", 12) }));
    assert!(session.world().feed.is_empty());
    assert_eq!(session.counters().snapshot().items_deferred, 1);

    remote.with(|a| {
        a.state.tick = 12;
        a.feed.insert(0, post("early", 12));
    });
    clock.advance(2_000);
    session.run_due();
    session.settle().await;

    assert_eq!(feed_ids(&session), vec!["early"]);
    assert_eq!(session.world().tick, 12);
}

#[tokio::test]
async fn tick_update_push_moves_the_world() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    session.handle_socket(SocketEvent::Opened { generation: 1 });

    session.handle_socket(frame(&PushMessage::TickUpdate { tick: 30, is_running: false, speed: 4.0 }));
    session.handle_socket(frame(&PushMessage::LogAdded { log: log("l30", 30) }));

    let world = session.world();
    assert_eq!(world.tick, 30);
    assert!(!world.is_running);
    assert!((world.speed - 4.0).abs() < f64::EPSILON);
    assert_eq!(world.logs.len(), 1);
    assert_eq!(session.coordinator().remote_tick(), 30);
}

#[tokio::test]
async fn repeated_polls_stay_idempotent_with_a_tiny_dedup_setting() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| a.feed = vec![post("p3", 3), post("p2", 2), post("p1", 1)]);
    let clock = VirtualClock::new(0);
    let mut config = remote_config();
    config.remote.feed_window = 3;
    config.dedup.capacity_per_stream = 2;
    let mut session = Session::new(config, Some(remote.clone()), clock.clone()).detached_push();
    session.start();
    session.run_due();
    session.settle().await;

    for _ in 0..2 {
        clock.advance(2_000);
        session.run_due();
        session.settle().await;
    }
    assert_eq!(feed_ids(&session), vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn malformed_push_frame_leaves_a_diagnostic() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    session.handle_socket(SocketEvent::Opened { generation: 1 });

    session.handle_socket(SocketEvent::Text { generation: 1, text: "{not json".into() });
    session.handle_socket(SocketEvent::Text { generation: 7, text: "{not json".into() });

    assert_eq!(session.world().diagnostics.len(), 1, "stale generations are ignored silently");
    assert_eq!(session.counters().snapshot().frames_dropped, 1);
}

#[tokio::test]
async fn lost_push_channel_schedules_reconnect() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    session.handle_socket(SocketEvent::Opened { generation: 1 });
    session.handle_socket(SocketEvent::Closed { generation: 1, reason: Some("reset".into()) });

    assert!(session.scheduler().is_scheduled(TaskKind::TransportReconnect));
    clock.advance(500);
    session.run_due();
    let transport = session.transport().expect("push channel");
    assert_eq!(transport.generation(), 2);
}

#[tokio::test]
async fn unsubscribe_is_written_at_once_when_connected() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    session.handle_socket(SocketEvent::Opened { generation: 1 });
    let greeting = session.detached_writes().len();

    session.handle_command(unsubscribe_posts());

    let writes = session.detached_writes();
    assert_eq!(writes.len(), greeting + 1);
    assert!(matches!(
        writes.last(),
        Some(OutboundMessage::Unsubscribe { event_types, agent_ids })
            if event_types == &["post"] && agent_ids == &[AgentId(2)]
    ));
    assert_eq!(session.counters().snapshot().outbound_queued, 0);
}

#[tokio::test]
async fn unsubscribe_waits_for_the_channel_when_disconnected() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;

    session.handle_command(unsubscribe_posts());
    assert!(session.detached_writes().is_empty());
    assert_eq!(session.counters().snapshot().outbound_queued, 1);

    session.handle_socket(SocketEvent::Opened { generation: 1 });
    let writes = session.detached_writes();
    assert!(matches!(writes.first(), Some(OutboundMessage::Subscribe { .. })), "greeting goes first");
    assert!(matches!(writes.last(), Some(OutboundMessage::Unsubscribe { .. })));
    assert_eq!(session.counters().snapshot().outbound_flushed, 1);
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_intervention_changes_nothing_but_diagnostics() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| a.reject_interventions = Some("agent 99 does not exist".into()));
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    let before = session.world().diagnostics.len();

    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::ApplyIntervention {
        command: "ban agent".into(),
        target_agent_id: Some(AgentId(99)),
        reply: Some(reply),
    });
    session.settle().await;

    let outcome = rx.await.expect("reply");
    assert!(matches!(outcome, InterventionOutcome::Rejected(ref r) if r.contains("does not exist")));
    assert!(session.world().interventions.is_empty());
    assert!(!session.world().agents.contains_key(&AgentId(99)));
    assert_eq!(session.world().diagnostics.len(), before + 1);
    assert_eq!(session.counters().snapshot().interventions_rejected, 1);
}

#[tokio::test]
async fn accepted_intervention_is_not_duplicated_by_polling() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;

    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::ApplyIntervention {
        command: "spread rumor".into(),
        target_agent_id: Some(AgentId(2)),
        reply: Some(reply),
    });
    session.settle().await;
    assert!(rx.await.expect("reply").is_applied());

    clock.advance(2_000);
    session.run_due();
    session.settle().await;
    assert_eq!(session.world().interventions.len(), 1);
}

#[tokio::test]
async fn refused_toggle_is_rolled_back() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| a.refuse_state_patches = true);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    assert!(session.world().is_running);

    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::ToggleRun { reply: Some(reply) });
    assert!(!session.world().is_running, "applied optimistically");
    session.settle().await;

    assert!(matches!(rx.await.expect("reply"), IntentOutcome::Rejected(_)));
    assert!(session.world().is_running);
}

#[tokio::test]
async fn agent_edit_is_sent_to_the_authority() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;

    let (reply, rx) = oneshot::channel();
    let patch = AgentStatePatch { stance: Some(0.75), ..AgentStatePatch::default() };
    session.handle_command(Command::EditAgent { agent_id: AgentId(1), patch: patch.clone(), reply: Some(reply) });
    session.settle().await;

    assert_eq!(rx.await.expect("reply"), IntentOutcome::Applied);
    assert_eq!(remote.with(|a| a.agent_patches.clone()), vec![(AgentId(1), patch)]);
    assert!((session.world().agents[&AgentId(1)].state.stance - 0.75).abs() < f64::EPSILON);
}

#[tokio::test]
async fn refused_agent_edit_is_rolled_back() {
    let remote = FakeRemote::at_tick(10);
    remote.with(|a| a.refuse_state_patches = true);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;
    let before = session.world().agents[&AgentId(2)].state.clone();

    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::EditAgent {
        agent_id: AgentId(2),
        patch: AgentStatePatch { mood: Some(-1.0), ..AgentStatePatch::default() },
        reply: Some(reply),
    });
    session.settle().await;

    assert!(matches!(rx.await.expect("reply"), IntentOutcome::Rejected(_)));
    assert_eq!(session.world().agents[&AgentId(2)].state, before);
    assert_eq!(session.world().diagnostics.len(), 1);
}

#[tokio::test]
async fn config_edits_are_debounced_into_one_patch() {
    let remote = FakeRemote::at_tick(10);
    let clock = VirtualClock::new(0);
    let mut session = hydrated(&remote, &clock).await;

    session.handle_command(Command::PatchConfig { patch: ConfigPatch { world_size: Some(500), ..ConfigPatch::default() } });
    clock.advance(100);
    session.handle_command(Command::PatchConfig { patch: ConfigPatch { sample_agents: Some(12), ..ConfigPatch::default() } });
    clock.advance(100);
    session.run_due();
    assert!(remote.with(|a| a.config_patches.is_empty()));

    clock.advance(400);
    session.run_due();
    session.settle().await;
    let patches = remote.with(|a| a.config_patches.clone());
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].world_size, Some(500));
    assert_eq!(patches[0].sample_agents, Some(12));
    assert_eq!(session.world().config.world_size, 500);
}

// ---------------------------------------------------------------------------
// Local mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_session_simulates_only_while_running() {
    let clock = VirtualClock::new(0);
    let mut session: Session<FakeRemote, VirtualClock> =
        Session::new(WorldlineConfig::default(), None, clock.clone());
    session.start();
    assert!(!session.scheduler().is_scheduled(TaskKind::TickAdvance));

    session.handle_command(Command::ToggleRun { reply: None });
    assert!(session.scheduler().is_scheduled(TaskKind::TickAdvance));
    for _ in 0..30 {
        clock.advance(100);
        session.run_due();
    }
    assert_eq!(session.world().tick, 3);
    assert!(!session.world().feed.is_empty());

    session.handle_command(Command::ToggleRun { reply: None });
    assert!(!session.scheduler().is_scheduled(TaskKind::TickAdvance));
    clock.advance(10_000);
    session.run_due();
    assert_eq!(session.world().tick, 3);
}

#[tokio::test]
async fn local_snapshot_load_stops_the_simulator() {
    let clock = VirtualClock::new(0);
    let mut session: Session<FakeRemote, VirtualClock> =
        Session::new(WorldlineConfig::default(), None, clock.clone());
    session.start();
    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::CreateSnapshot { name: "start".into(), reply: Some(reply) });
    let id = rx.await.expect("id");

    session.handle_command(Command::ToggleRun { reply: None });
    clock.advance(5_000);
    session.run_due();
    assert!(session.world().tick > 0);

    session.handle_command(Command::LoadSnapshot { id: id.clone() });
    assert_eq!(session.world().tick, 0);
    assert!(!session.world().is_running);
    assert!(!session.scheduler().is_scheduled(TaskKind::TickAdvance));
    assert_eq!(session.world().current_snapshot_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn local_intervention_applies_immediately() {
    let clock = VirtualClock::new(0);
    let mut session: Session<FakeRemote, VirtualClock> =
        Session::new(WorldlineConfig::default(), None, clock);
    let (reply, rx) = oneshot::channel();
    session.handle_command(Command::ApplyIntervention {
        command: "announce curfew".into(),
        target_agent_id: None,
        reply: Some(reply),
    });
    assert!(rx.await.expect("reply").is_applied());
    assert_eq!(session.world().interventions.len(), 1);
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn run_loop_answers_commands_and_shuts_down() {
    use worldline_core::scheduler::SystemClock;
    use worldline_session::SessionHandle;

    let mut config = WorldlineConfig::default();
    config.simulation.config.ticks_per_second = 200.0;
    config.simulator.timer_period_ms = 5;
    let session: Session<FakeRemote> = Session::new(config, None, SystemClock::new());
    let (handle, commands) = SessionHandle::channel(8);
    let driver = tokio::spawn(session.run(commands));

    assert_eq!(handle.toggle_run().await, Some(IntentOutcome::Applied));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let world = handle.inspect().await.expect("world");
    assert!(world.tick > 0);

    handle.shutdown().await;
    let final_world = driver.await.expect("driver");
    assert!(final_world.tick >= world.tick);
}
