//! Session driver.
//!
//! One [`Session`] owns the world and every writer to it. A single loop
//! wakes on the earliest scheduler deadline, a socket event, a finished
//! background request or an operator command, and handles exactly one of
//! them before sleeping again. Nothing touches the world concurrently.
//!
//! ```text
//!                   ┌──────────── Session::run ────────────┐
//!  Scheduler ──────▶│ TickAdvance      → MockSimulator      │
//!  (Clock)          │ HydrateRetry     → SyncCoordinator    │──▶ WorldState
//!                   │ SteadyPoll       → SyncCoordinator    │
//!                   │ TransportHeartbeat / Reconnect        │
//!                   │ PatchFlush       → PatchDebouncer     │
//!  socket task ────▶│ SocketEvent      → TransportClient    │
//!  spawned fetch ──▶│ Completion       → coordinator/intents│
//!  SessionHandle ──▶│ Command          → intents            │
//!                   └───────────────────────────────────────┘
//! ```
//!
//! Local mode (no remote authority) only schedules `TickAdvance`, and only
//! while the world is running. Remote mode never runs the simulator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use worldline_core::config::WorldlineConfig;
use worldline_core::metrics::SyncCounters;
use worldline_core::scheduler::{Clock, Scheduler, SystemClock, TaskKind};
use worldline_core::simulator::MockSimulator;
use worldline_core::transition::{Transition, apply_in_place};
use worldline_core::types::{AgentId, AgentStatePatch, ConfigPatch, InterventionRecord, Mode};
use worldline_core::world::{WorldState, WorldView};
use worldline_remote::client::{RemoteQuery, RemoteResult, fetch_hydrate, fetch_poll};
use worldline_remote::debounce::PatchDebouncer;
use worldline_remote::socket::{self, SocketEvent, SocketHandle};
use worldline_remote::transport::{Subscription, TransportAction, TransportClient};
use worldline_remote::types::{OutboundMessage, PushMessage, RemoteBatch, Windows};

use crate::coordinator::{FetchKind, FetchTicket, SyncCoordinator, SyncOutcome};
use crate::diagnostics;
use crate::intents::{self, IntentOutcome, InterventionOutcome, PendingAgentEdit, PendingChange};

/// Optional reply channel for a command.
pub type Reply<T> = Option<oneshot::Sender<T>>;

/// Something the operator (or a renderer) asks the session to do.
#[derive(Debug)]
pub enum Command {
    ToggleRun { reply: Reply<IntentOutcome> },
    SetSpeed { speed: f64, reply: Reply<IntentOutcome> },
    /// Scrub to a tick.
    SetTick { tick: i64 },
    SelectAgent { agent_id: Option<AgentId> },
    /// Patch one agent's state.
    EditAgent { agent_id: AgentId, patch: AgentStatePatch, reply: Reply<IntentOutcome> },
    ApplyIntervention {
        command: String,
        target_agent_id: Option<AgentId>,
        reply: Reply<InterventionOutcome>,
    },
    PatchConfig { patch: ConfigPatch },
    /// Ask the push channel for more message types or agents.
    Subscribe { event_types: Vec<String>, agent_ids: Vec<AgentId> },
    /// Ask the push channel to stop sending some message types or agents.
    Unsubscribe { event_types: Vec<String>, agent_ids: Vec<AgentId> },
    CreateSnapshot { name: String, reply: Reply<String> },
    LoadSnapshot { id: String },
    DeleteSnapshot { id: String },
    ClearSnapshots,
    /// Clone of the current world, for renderers.
    Inspect { reply: oneshot::Sender<WorldState> },
    Shutdown,
}

/// A background request that finished.
#[derive(Debug)]
enum Completion {
    Fetch { ticket: FetchTicket, result: RemoteResult<RemoteBatch> },
    StatePatched { change: PendingChange, result: RemoteResult<()>, reply: Reply<IntentOutcome> },
    AgentPatched { edit: PendingAgentEdit, result: RemoteResult<()>, reply: Reply<IntentOutcome> },
    Intervention { result: RemoteResult<InterventionRecord>, reply: Reply<InterventionOutcome> },
    ConfigPatched { patch: ConfigPatch, result: RemoteResult<()> },
}

enum Wake {
    Timer,
    Socket(SocketEvent),
    Completion(Completion),
    Command(Option<Command>),
}

/// Owns the world and drives every source that writes to it.
pub struct Session<R: RemoteQuery + 'static, C: Clock = SystemClock> {
    config: WorldlineConfig,
    world: WorldState,
    clock: C,
    scheduler: Scheduler,
    simulator: MockSimulator,
    remote: Option<Arc<R>>,
    windows: Windows,
    coordinator: SyncCoordinator,
    transport: Option<TransportClient>,
    socket: Option<SocketHandle>,
    dial_sockets: bool,
    detached_writes: Vec<OutboundMessage>,
    debouncer: PatchDebouncer,
    counters: Arc<SyncCounters>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    socket_tx: mpsc::UnboundedSender<SocketEvent>,
    socket_rx: mpsc::UnboundedReceiver<SocketEvent>,
    in_flight: usize,
}

impl<R: RemoteQuery + 'static, C: Clock> std::fmt::Debug for Session<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.world.mode)
            .field("tick", &self.world.tick)
            .field("phase", &self.coordinator.phase())
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteQuery + 'static, C: Clock> Session<R, C> {
    /// Build a session. Remote mode iff `remote` is given.
    #[must_use]
    pub fn new(config: WorldlineConfig, remote: Option<R>, clock: C) -> Self {
        let mode = if remote.is_some() { Mode::Remote } else { Mode::Local };
        let world = WorldState::for_mode(&config, mode);
        let counters = Arc::new(SyncCounters::new());
        let transport = match (&remote, config.push_url()) {
            (Some(_), Some(url)) => {
                let mut client = TransportClient::new(url, &config.transport, Arc::clone(&counters));
                client.set_greeting(Some(OutboundMessage::Subscribe {
                    event_types: config.transport.subscribe_event_types.clone(),
                    agent_ids: Vec::new(),
                }));
                Some(client)
            }
            _ => None,
        };
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        Self {
            windows: Windows::from(&config.remote),
            simulator: MockSimulator::new(config.simulator.clone()),
            coordinator: SyncCoordinator::new(config.dedup_capacity(), Arc::clone(&counters)),
            debouncer: PatchDebouncer::new(config.remote.patch_debounce_ms),
            remote: remote.map(Arc::new),
            config,
            world,
            clock,
            scheduler: Scheduler::new(),
            transport,
            socket: None,
            dial_sockets: true,
            detached_writes: Vec::new(),
            counters,
            completions_tx,
            completions_rx,
            socket_tx,
            socket_rx,
            in_flight: 0,
        }
    }

    /// Run the push-channel state machine without dialing real sockets;
    /// socket events must then be fed through [`Session::handle_socket`],
    /// and writes to an open channel are kept in [`Session::detached_writes`].
    #[must_use]
    pub fn detached_push(mut self) -> Self {
        self.dial_sockets = false;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The world model.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Read-only view for renderers.
    #[must_use]
    pub fn view(&self) -> WorldView<'_> {
        self.world.view()
    }

    /// Shared synchronization counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<SyncCounters> {
        &self.counters
    }

    /// The synchronization coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// The push-channel client, in remote mode with a push URL.
    #[must_use]
    pub fn transport(&self) -> Option<&TransportClient> {
        self.transport.as_ref()
    }

    /// The task table.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Background requests not yet folded back in.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Messages written to a detached push channel, oldest first.
    #[must_use]
    pub fn detached_writes(&self) -> &[OutboundMessage] {
        &self.detached_writes
    }

    /// Listen to every parsed push message. `None` without a push channel.
    pub fn subscribe_push(&self, listener: impl Fn(&PushMessage) + Send + Sync + 'static) -> Option<Subscription> {
        self.transport.as_ref().map(|t| t.subscribe(listener))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Schedule the tasks for this session's mode.
    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        match self.world.mode {
            Mode::Local => {
                info!(agents = self.world.agents.len(), seed = self.world.config.seed, "Session started in local mode");
                self.sync_simulator(now);
            }
            Mode::Remote => {
                let remote = &self.config.remote;
                info!(
                    base_url = remote.base_url.as_deref().unwrap_or_default(),
                    push = self.transport.is_some(),
                    "Session started in remote mode"
                );
                self.scheduler.every(TaskKind::HydrateRetry, remote.hydrate_retry_ms, now);
                self.scheduler.every(
                    TaskKind::SteadyPoll,
                    remote.poll_interval_ms,
                    now.saturating_add(remote.poll_interval_ms),
                );
                if let Some(transport) = self.transport.as_mut() {
                    let action = transport.connect();
                    let heartbeat = self.config.transport.heartbeat_interval_ms;
                    self.scheduler.every(TaskKind::TransportHeartbeat, heartbeat, now.saturating_add(heartbeat));
                    self.handle_action(action);
                }
            }
        }
    }

    /// Drive the session until [`Command::Shutdown`] arrives or every
    /// command sender is dropped. Returns the final world.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> WorldState {
        self.start();
        loop {
            self.run_due();
            let wait = self
                .scheduler
                .next_deadline()
                .map(|due| Duration::from_millis(due.saturating_sub(self.clock.now_ms())));
            let wake = tokio::select! {
                () = sleep_or_park(wait) => Wake::Timer,
                Some(event) = self.socket_rx.recv() => Wake::Socket(event),
                Some(done) = self.completions_rx.recv() => Wake::Completion(done),
                command = commands.recv() => Wake::Command(command),
            };
            match wake {
                Wake::Timer => {}
                Wake::Socket(event) => self.handle_socket(event),
                Wake::Completion(done) => self.handle_completion(done),
                Wake::Command(Some(Command::Shutdown) | None) => break,
                Wake::Command(Some(command)) => self.handle_command(command),
            }
        }
        self.teardown();
        self.world
    }

    /// Stop every timer, close the push channel and drop its listeners.
    /// Requests still in flight are discarded when they finish.
    pub fn teardown(&mut self) {
        self.scheduler.clear();
        self.simulator.stop();
        self.coordinator.teardown();
        if let Some(transport) = self.transport.as_mut() {
            let action = transport.disconnect();
            transport.clear_listeners();
            self.handle_action(action);
        }
        info!(tick = self.world.tick, "Session torn down");
    }

    // -----------------------------------------------------------------------
    // Scheduled tasks
    // -----------------------------------------------------------------------

    /// Run every task whose deadline has passed.
    pub fn run_due(&mut self) {
        let now = self.clock.now_ms();
        for kind in self.scheduler.due(now) {
            self.run_task(kind, now);
        }
    }

    fn run_task(&mut self, kind: TaskKind, now: u64) {
        match kind {
            TaskKind::TickAdvance => {
                let transitions = self.simulator.advance(&self.world, now);
                self.apply_all(transitions);
                self.sync_simulator(now);
            }
            TaskKind::HydrateRetry => {
                if self.coordinator.is_hydrated() {
                    self.scheduler.cancel(TaskKind::HydrateRetry);
                } else if let Some(ticket) = self.coordinator.begin_hydrate() {
                    self.spawn_fetch(ticket);
                }
            }
            TaskKind::SteadyPoll => {
                if let Some(ticket) = self.coordinator.begin_poll() {
                    self.spawn_fetch(ticket);
                }
            }
            TaskKind::TransportHeartbeat => {
                if let Some(transport) = self.transport.as_mut() {
                    transport.heartbeat();
                }
                self.flush_outbound();
            }
            TaskKind::TransportReconnect => {
                if let Some(transport) = self.transport.as_mut() {
                    let action = transport.connect();
                    self.handle_action(action);
                }
            }
            TaskKind::PatchFlush => {
                if let Some(patch) = self.debouncer.take_due(now) {
                    self.spawn_config_patch(patch);
                }
            }
        }
    }

    /// Keep `TickAdvance` scheduled exactly while a local world runs.
    fn sync_simulator(&mut self, now: u64) {
        if self.world.mode != Mode::Local {
            return;
        }
        let scheduled = self.scheduler.is_scheduled(TaskKind::TickAdvance);
        if self.world.is_running && !scheduled {
            let period = self.config.simulator.timer_period_ms;
            // The first advance only primes the accumulator.
            let primed = self.simulator.advance(&self.world, now);
            self.apply_all(primed);
            self.scheduler.every(TaskKind::TickAdvance, period, now.saturating_add(period));
        } else if !self.world.is_running && scheduled {
            self.scheduler.cancel(TaskKind::TickAdvance);
            self.simulator.stop();
        }
    }

    fn apply_all(&mut self, transitions: Vec<Transition>) {
        for transition in transitions {
            apply_in_place(&mut self.world, transition);
        }
    }

    // -----------------------------------------------------------------------
    // Background requests
    // -----------------------------------------------------------------------

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let windows = self.windows;
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = match ticket.kind() {
                FetchKind::Hydrate => fetch_hydrate(remote.as_ref(), windows).await,
                FetchKind::Poll => fetch_poll(remote.as_ref(), windows).await,
            };
            let _ = tx.send(Completion::Fetch { ticket, result });
        });
    }

    fn spawn_state_patch(&mut self, change: PendingChange, reply: Reply<IntentOutcome>) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let patch = change.patch(&self.world);
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = remote.patch_state(patch).await;
            let _ = tx.send(Completion::StatePatched { change, result, reply });
        });
    }

    fn spawn_agent_patch(&mut self, edit: PendingAgentEdit, reply: Reply<IntentOutcome>) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = remote.patch_agent_state(edit.agent_id(), edit.patch()).await;
            let _ = tx.send(Completion::AgentPatched { edit, result, reply });
        });
    }

    fn spawn_config_patch(&mut self, patch: ConfigPatch) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = remote.patch_config(patch.clone()).await;
            let _ = tx.send(Completion::ConfigPatched { patch, result });
        });
    }

    /// Wait for the next background request to finish and fold it in.
    /// Returns `false` if nothing was in flight.
    pub async fn settle_next(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(done) => {
                self.handle_completion(done);
                true
            }
            None => false,
        }
    }

    /// Wait until every background request has been folded in.
    pub async fn settle(&mut self) {
        while self.settle_next().await {}
    }

    fn handle_completion(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let now = self.clock.now_ms();
        match done {
            Completion::Fetch { ticket, result } => match ticket.kind() {
                FetchKind::Hydrate => {
                    let outcome = self.coordinator.finish_hydrate(ticket, result, &mut self.world);
                    if matches!(outcome, SyncOutcome::Applied(_)) {
                        self.scheduler.cancel(TaskKind::HydrateRetry);
                    }
                }
                FetchKind::Poll => {
                    self.coordinator.finish_poll(ticket, result, &mut self.world);
                }
            },
            Completion::StatePatched { change, result, reply } => {
                let outcome = change.settle(result, &mut self.world);
                send_reply(reply, outcome);
            }
            Completion::AgentPatched { edit, result, reply } => {
                let outcome = edit.settle(result, &mut self.world);
                send_reply(reply, outcome);
            }
            Completion::Intervention { result, reply } => {
                let outcome =
                    intents::settle_intervention(result, &mut self.world, &mut self.coordinator, &self.counters);
                send_reply(reply, outcome);
            }
            Completion::ConfigPatched { patch, result } => {
                if let Err(err) = result {
                    if self.coordinator.is_torn_down() {
                        return;
                    }
                    warn!(error = %err, "Config patch failed, will retry");
                    diagnostics::report(&mut self.world, format!("Config update failed: {err}"));
                    let due = self.debouncer.restore(patch, now);
                    self.scheduler.once(TaskKind::PatchFlush, due);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Push channel
    // -----------------------------------------------------------------------

    fn handle_action(&mut self, action: TransportAction) {
        match action {
            TransportAction::Dial { generation } => {
                if let Some(old) = self.socket.take() {
                    old.hangup();
                }
                let Some(url) = self.transport.as_ref().map(|t| t.url().to_string()) else {
                    return;
                };
                if self.dial_sockets {
                    self.socket = Some(socket::dial(url, generation, self.socket_tx.clone()));
                } else {
                    debug!(generation, "Push channel detached, not dialing");
                }
            }
            TransportAction::Hangup => {
                if let Some(socket) = self.socket.take() {
                    socket.hangup();
                }
            }
            TransportAction::ReconnectAt { due_ms } => self.scheduler.once(TaskKind::TransportReconnect, due_ms),
            TransportAction::Idle => {}
        }
    }

    /// Fold one socket event in.
    pub fn handle_socket(&mut self, event: SocketEvent) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        match event {
            SocketEvent::Opened { generation } => {
                let messages = transport.on_open(generation);
                self.write(messages);
            }
            SocketEvent::Text { generation, text } => {
                if generation != transport.generation() {
                    return;
                }
                match transport.on_frame(generation, &text) {
                    Some(message) => {
                        self.coordinator.on_push(message, &mut self.world);
                    }
                    None => diagnostics::report(&mut self.world, "Dropped malformed push message"),
                }
            }
            SocketEvent::Unsupported { generation, kind } => {
                if generation == transport.generation() {
                    transport.on_unsupported(kind);
                    diagnostics::report(&mut self.world, format!("Dropped {kind} push frame"));
                }
            }
            SocketEvent::Closed { generation, reason } => {
                let now = self.clock.now_ms();
                let action = transport.on_close(generation, now, reason.as_deref());
                if self.socket.as_ref().is_some_and(|s| s.generation() == generation) {
                    self.socket = None;
                }
                self.handle_action(action);
            }
        }
    }

    fn flush_outbound(&mut self) {
        let messages = self.transport.as_mut().map(TransportClient::take_outbound).unwrap_or_default();
        self.write(messages);
    }

    fn write(&mut self, messages: Vec<OutboundMessage>) {
        if messages.is_empty() {
            return;
        }
        let failed = match &self.socket {
            Some(socket) => socket.send(messages),
            None if !self.dial_sockets => {
                self.detached_writes.extend(messages);
                Vec::new()
            }
            None => messages,
        };
        if failed.is_empty() {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.requeue(failed);
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Carry out one operator command. [`Command::Shutdown`] is handled by
    /// [`Session::run`] and ignored here.
    pub fn handle_command(&mut self, command: Command) {
        let now = self.clock.now_ms();
        match command {
            Command::ToggleRun { reply } => {
                let change = intents::toggle_run(&mut self.world);
                self.confirm(change, reply, now);
            }
            Command::SetSpeed { speed, reply } => {
                let change = intents::set_speed(&mut self.world, speed);
                self.confirm(change, reply, now);
            }
            Command::SetTick { tick } => {
                let change = intents::set_tick(&mut self.world, tick);
                self.confirm(change, None, now);
            }
            Command::SelectAgent { agent_id } => {
                apply_in_place(&mut self.world, Transition::SelectAgent { agent_id });
            }
            Command::EditAgent { agent_id, patch, reply } => {
                let edit = intents::edit_agent(&mut self.world, agent_id, patch);
                if self.remote.is_some() {
                    self.spawn_agent_patch(edit, reply);
                } else {
                    send_reply(reply, IntentOutcome::Applied);
                }
            }
            Command::ApplyIntervention { command, target_agent_id, reply } => {
                self.apply_intervention(&command, target_agent_id, reply);
            }
            Command::PatchConfig { patch } => {
                apply_in_place(&mut self.world, Transition::SetConfig { patch: patch.clone() });
                if self.remote.is_some() {
                    let due = self.debouncer.absorb(patch, now);
                    self.scheduler.once(TaskKind::PatchFlush, due);
                }
            }
            Command::Subscribe { event_types, agent_ids } => {
                self.send_outbound(OutboundMessage::Subscribe { event_types, agent_ids });
            }
            Command::Unsubscribe { event_types, agent_ids } => {
                self.send_outbound(OutboundMessage::Unsubscribe { event_types, agent_ids });
            }
            Command::CreateSnapshot { name, reply } => {
                let id = uuid::Uuid::new_v4().to_string();
                let created_at = chrono::Utc::now();
                apply_in_place(&mut self.world, Transition::CreateSnapshot { id: id.clone(), name, created_at });
                info!(%id, tick = self.world.tick, "Snapshot created");
                send_reply(reply, id);
            }
            Command::LoadSnapshot { id } => {
                if self.world.snapshot(&id).is_none() {
                    debug!(%id, "Snapshot to load is gone");
                }
                apply_in_place(&mut self.world, Transition::LoadSnapshot { id });
                self.sync_simulator(now);
            }
            Command::DeleteSnapshot { id } => apply_in_place(&mut self.world, Transition::DeleteSnapshot { id }),
            Command::ClearSnapshots => apply_in_place(&mut self.world, Transition::ClearSnapshots),
            Command::Inspect { reply } => {
                let _ = reply.send(self.world.clone());
            }
            Command::Shutdown => {}
        }
    }

    /// Queue `message` on the push channel and write it now if connected.
    fn send_outbound(&mut self, message: OutboundMessage) {
        let Some(transport) = self.transport.as_mut() else {
            debug!(?message, "No push channel, dropping outbound message");
            return;
        };
        transport.send(message);
        self.flush_outbound();
    }

    fn confirm(&mut self, change: PendingChange, reply: Reply<IntentOutcome>, now: u64) {
        if self.remote.is_some() {
            self.spawn_state_patch(change, reply);
        } else {
            self.sync_simulator(now);
            send_reply(reply, IntentOutcome::Applied);
        }
    }

    fn apply_intervention(&mut self, command: &str, target: Option<AgentId>, reply: Reply<InterventionOutcome>) {
        let Some(remote) = self.remote.clone() else {
            let outcome = intents::apply_local_intervention(&mut self.world, command, target, &self.counters);
            send_reply(reply, outcome);
            return;
        };
        let request = match intents::intervention_request(&self.world, command, target) {
            Ok(request) => request,
            Err(reason) => {
                let outcome = intents::reject(&mut self.world, &reason, &self.counters);
                send_reply(reply, outcome);
                return;
            }
        };
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = remote.apply_intervention(request).await;
            let _ = tx.send(Completion::Intervention { result, reply });
        });
    }
}

fn send_reply<T>(reply: Reply<T>, value: T) {
    if let Some(reply) = reply {
        let _ = reply.send(value);
    }
}

async fn sleep_or_park(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable sender side of a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// A handle plus the receiver to pass to [`Session::run`].
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Send a command. Returns `false` if the session has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.tx.send(command).await.is_ok()
    }

    /// Flip run/pause and wait for the outcome.
    pub async fn toggle_run(&self) -> Option<IntentOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleRun { reply: Some(reply) }).await;
        rx.await.ok()
    }

    /// Change speed and wait for the outcome.
    pub async fn set_speed(&self, speed: f64) -> Option<IntentOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetSpeed { speed, reply: Some(reply) }).await;
        rx.await.ok()
    }

    /// Apply an intervention and wait for the outcome.
    pub async fn apply_intervention(
        &self,
        command: impl Into<String>,
        target_agent_id: Option<AgentId>,
    ) -> Option<InterventionOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyIntervention { command: command.into(), target_agent_id, reply: Some(reply) })
            .await;
        rx.await.ok()
    }

    /// Patch one agent's state and wait for the outcome.
    pub async fn edit_agent(&self, agent_id: AgentId, patch: AgentStatePatch) -> Option<IntentOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::EditAgent { agent_id, patch, reply: Some(reply) }).await;
        rx.await.ok()
    }

    /// Subscribe the push channel to more message types or agents.
    pub async fn subscribe(&self, event_types: Vec<String>, agent_ids: Vec<AgentId>) -> bool {
        self.send(Command::Subscribe { event_types, agent_ids }).await
    }

    /// Unsubscribe the push channel from message types or agents.
    pub async fn unsubscribe(&self, event_types: Vec<String>, agent_ids: Vec<AgentId>) -> bool {
        self.send(Command::Unsubscribe { event_types, agent_ids }).await
    }

    /// Clone of the current world.
    pub async fn inspect(&self) -> Option<WorldState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Inspect { reply }).await;
        rx.await.ok()
    }

    /// Ask the session to stop.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }
}
