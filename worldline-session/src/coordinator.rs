//! Remote synchronization coordinator.
//!
//! Reconciles three overlapping feeds from the remote authority into the
//! world model: bootstrap hydration, steady-state polling and push-channel
//! messages. The coordinator does no I/O itself; the session starts fetches
//! with the tickets handed out here and brings the results back.
//!
//! ```text
//!            begin_hydrate()            finish_hydrate(Ok)
//! ColdStart ───────────────▶ Hydrating ───────────────────▶ Hydrated
//!                              ▲    │                          │
//!                              └────┘ finish_hydrate(Err)      │ begin_poll()/finish_poll()
//!                           (retried by the session timer)     ▼ on_push()
//! ```
//!
//! ## Claim, then ingest
//!
//! Every stream item is claimed in its per-stream [`DedupSets`] entry before
//! the matching transition is applied. A second delivery of the same id, from
//! a poll, a push or an overlapping fetch, finds the claim and is skipped.
//! Items ahead of the last known remote tick are held back without a claim
//! so the next poll can still ingest them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use worldline_core::dedup::{DedupSets, Stream};
use worldline_core::metrics::SyncCounters;
use worldline_core::transition::{Transition, apply_in_place};
use worldline_core::types::{
    ConfigPatch, FeedPost, InterventionRecord, LogLine, StreamItem, TimelineEvent,
};
use worldline_core::world::WorldState;
use worldline_remote::client::RemoteResult;
use worldline_remote::types::{PushMessage, RemoteBatch, RemoteWorldState};

use crate::diagnostics;

/// Where the coordinator is in its bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing fetched yet.
    ColdStart,
    /// At least one hydration attempt started; none succeeded yet.
    Hydrating,
    /// Bootstrap done; polling and push ingestion are live.
    Hydrated,
}

/// Which kind of fetch a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Hydrate,
    Poll,
}

/// Proof that a fetch was started by this coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    id: u64,
    kind: FetchKind,
}

impl FetchTicket {
    /// Hydrate or poll.
    #[must_use]
    pub fn kind(&self) -> FetchKind {
        self.kind
    }
}

/// What one ingestion pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items applied to the world.
    pub ingested: usize,
    /// Items skipped because their id was already claimed.
    pub duplicates: usize,
    /// Items held back because they are ahead of the remote tick.
    pub deferred: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: Self) {
        self.ingested += other.ingested;
        self.duplicates += other.duplicates;
        self.deferred += other.deferred;
    }
}

/// Result of finishing a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The batch was reconciled into the world.
    Applied(IngestReport),
    /// The fetch failed; the world is unchanged apart from a diagnostic.
    Failed(String),
    /// The result arrived after teardown, or for a ticket no longer current.
    Discarded,
}

/// Reconciles remote data into a [`WorldState`].
#[derive(Debug)]
pub struct SyncCoordinator {
    phase: SyncPhase,
    hydrate_in_flight: Option<u64>,
    poll_in_flight: Option<u64>,
    next_ticket: u64,
    remote_tick: u64,
    dedup: DedupSets,
    counters: Arc<SyncCounters>,
    torn_down: bool,
}

impl SyncCoordinator {
    /// A cold coordinator whose dedup sets each hold `dedup_capacity` ids.
    #[must_use]
    pub fn new(dedup_capacity: usize, counters: Arc<SyncCounters>) -> Self {
        Self {
            phase: SyncPhase::ColdStart,
            hydrate_in_flight: None,
            poll_in_flight: None,
            next_ticket: 0,
            remote_tick: 0,
            dedup: DedupSets::new(dedup_capacity),
            counters,
            torn_down: false,
        }
    }

    /// Current bootstrap phase.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Whether hydration has succeeded.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.phase == SyncPhase::Hydrated
    }

    /// Last tick the remote authority reported.
    #[must_use]
    pub fn remote_tick(&self) -> u64 {
        self.remote_tick
    }

    /// Per-stream dedup sets, for inspection.
    #[must_use]
    pub fn dedup(&self) -> &DedupSets {
        &self.dedup
    }

    /// Whether [`SyncCoordinator::teardown`] was called.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // -----------------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------------

    /// Start a hydration attempt.
    ///
    /// Returns `None` when one is already in flight, hydration already
    /// succeeded, or the coordinator was torn down; overlapping attempts
    /// collapse into the first.
    pub fn begin_hydrate(&mut self) -> Option<FetchTicket> {
        if self.torn_down || self.is_hydrated() || self.hydrate_in_flight.is_some() {
            return None;
        }
        let ticket = self.issue(FetchKind::Hydrate);
        self.hydrate_in_flight = Some(ticket.id);
        self.phase = SyncPhase::Hydrating;
        SyncCounters::bump(&self.counters.hydrate_attempts);
        debug!(ticket = ticket.id, "Hydration started");
        Some(ticket)
    }

    /// Reconcile the result of a hydration fetch.
    pub fn finish_hydrate(
        &mut self,
        ticket: FetchTicket,
        result: RemoteResult<RemoteBatch>,
        world: &mut WorldState,
    ) -> SyncOutcome {
        if self.hydrate_in_flight != Some(ticket.id) {
            return SyncOutcome::Discarded;
        }
        self.hydrate_in_flight = None;
        if self.torn_down {
            debug!(ticket = ticket.id, "Discarding hydration result after teardown");
            return SyncOutcome::Discarded;
        }
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                SyncCounters::bump(&self.counters.hydrate_failures);
                warn!(error = %err, "Hydration failed, will retry");
                diagnostics::report(world, format!("Hydration failed: {err}"));
                return SyncOutcome::Failed(err.to_string());
            }
        };

        let RemoteBatch { state, agents, interventions, feed, events, logs } = batch;
        let remote_agents = state.agents.clone();
        self.adopt_state(&state, world);
        if !state.groups.is_empty() {
            apply_in_place(world, Transition::SetGroups { groups: state.groups });
        }
        for profile in agents {
            let agent_id = profile.id;
            let agent_state = remote_agents.get(&agent_id).map(|e| e.state.clone()).unwrap_or_default();
            apply_in_place(world, Transition::SeedAgent { agent_id, profile: Some(profile), state: agent_state });
        }
        for (agent_id, entry) in remote_agents {
            if !world.agents.contains_key(&agent_id) {
                apply_in_place(world, Transition::SeedAgent { agent_id, profile: None, state: entry.state });
            }
        }

        let report = self.ingest_windows(interventions, feed, events, logs, world);
        self.phase = SyncPhase::Hydrated;
        info!(
            tick = self.remote_tick,
            agents = world.agents.len(),
            ingested = report.ingested,
            duplicates = report.duplicates,
            "Hydrated from remote authority"
        );
        SyncOutcome::Applied(report)
    }

    // -----------------------------------------------------------------------
    // Steady-state polling
    // -----------------------------------------------------------------------

    /// Start a poll pass. `None` until hydrated, or while one is in flight.
    pub fn begin_poll(&mut self) -> Option<FetchTicket> {
        if self.torn_down || !self.is_hydrated() || self.poll_in_flight.is_some() {
            return None;
        }
        let ticket = self.issue(FetchKind::Poll);
        self.poll_in_flight = Some(ticket.id);
        Some(ticket)
    }

    /// Reconcile the result of a poll fetch.
    pub fn finish_poll(
        &mut self,
        ticket: FetchTicket,
        result: RemoteResult<RemoteBatch>,
        world: &mut WorldState,
    ) -> SyncOutcome {
        if self.poll_in_flight != Some(ticket.id) {
            return SyncOutcome::Discarded;
        }
        self.poll_in_flight = None;
        if self.torn_down {
            return SyncOutcome::Discarded;
        }
        SyncCounters::bump(&self.counters.polls);
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                SyncCounters::bump(&self.counters.poll_failures);
                warn!(error = %err, "Poll failed");
                diagnostics::report(world, format!("Sync poll failed: {err}"));
                return SyncOutcome::Failed(err.to_string());
            }
        };
        let RemoteBatch { state, interventions, feed, events, logs, .. } = batch;
        self.adopt_tick(&state, world);
        let report = self.ingest_windows(interventions, feed, events, logs, world);
        debug!(
            tick = self.remote_tick,
            ingested = report.ingested,
            duplicates = report.duplicates,
            "Poll pass reconciled"
        );
        SyncOutcome::Applied(report)
    }

    // -----------------------------------------------------------------------
    // Push channel
    // -----------------------------------------------------------------------

    /// Fold one push-channel message into the world.
    pub fn on_push(&mut self, message: PushMessage, world: &mut WorldState) -> IngestReport {
        if self.torn_down {
            return IngestReport::default();
        }
        let kind = message.kind();
        let report = match message {
            PushMessage::Connected { client_id } => {
                debug!(%client_id, "Push channel greeted us");
                IngestReport::default()
            }
            PushMessage::TickUpdate { tick, is_running, speed } => {
                self.remote_tick = tick;
                apply_in_place(world, Transition::SetTick { tick: tick_arg(tick) });
                apply_in_place(world, Transition::SetRunning { is_running });
                apply_in_place(world, Transition::SetSpeed { speed });
                IngestReport::default()
            }
            PushMessage::AgentUpdate { agent_id, state } => {
                apply_in_place(world, Transition::MutateAgentState { agent_id, patch: state });
                IngestReport::default()
            }
            PushMessage::PostCreated { post } => {
                self.ingest_one(Stream::Feed, post, world, |post| Transition::PushFeed { post })
            }
            PushMessage::EventCreated { event } => {
                self.ingest_one(Stream::Events, event, world, |event| Transition::PushEvent { event })
            }
            PushMessage::LogAdded { log } | PushMessage::SystemLog { log } => {
                self.ingest_one(Stream::Logs, log, world, |log| Transition::PushLog { log })
            }
            PushMessage::SimulationState { state } => {
                let state = *state;
                self.adopt_state(&state, world);
                for (agent_id, entry) in state.agents {
                    apply_in_place(world, Transition::SeedAgent { agent_id, profile: None, state: entry.state });
                }
                if !state.groups.is_empty() {
                    apply_in_place(world, Transition::SetGroups { groups: state.groups });
                }
                IngestReport::default()
            }
            PushMessage::Error { error, details } => {
                warn!(%error, ?details, "Remote authority reported an error");
                diagnostics::report(world, format!("Remote error: {error}"));
                IngestReport::default()
            }
            PushMessage::Pong {} => IngestReport::default(),
        };
        if report != IngestReport::default() {
            debug!(
                target: worldline_core::metrics::spans::PUSH,
                kind,
                ingested = report.ingested,
                duplicates = report.duplicates,
                deferred = report.deferred,
                "Push message reconciled"
            );
        }
        report
    }

    /// Claim and apply an intervention the remote authority just accepted
    /// from us, so later polls do not apply it again.
    pub fn ingest_accepted(&mut self, record: InterventionRecord, world: &mut WorldState) -> bool {
        let claimed = self.claim(Stream::Interventions, &record.id);
        if claimed {
            apply_in_place(world, Transition::ApplyIntervention { record });
        }
        claimed
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Stop accepting results. In-flight fetches are not aborted; whatever
    /// they return later is discarded.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        info!("Sync coordinator torn down");
    }

    /// Forget everything and start over from a cold state.
    pub fn reset(&mut self) {
        self.phase = SyncPhase::ColdStart;
        self.hydrate_in_flight = None;
        self.poll_in_flight = None;
        self.remote_tick = 0;
        self.dedup.clear();
        self.torn_down = false;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn issue(&mut self, kind: FetchKind) -> FetchTicket {
        self.next_ticket += 1;
        FetchTicket { id: self.next_ticket, kind }
    }

    fn adopt_tick(&mut self, state: &RemoteWorldState, world: &mut WorldState) {
        self.remote_tick = state.tick;
        apply_in_place(world, Transition::SetTick { tick: tick_arg(state.tick) });
        apply_in_place(world, Transition::SetRunning { is_running: state.is_running });
        apply_in_place(world, Transition::SetSpeed { speed: state.speed });
    }

    fn adopt_state(&mut self, state: &RemoteWorldState, world: &mut WorldState) {
        apply_in_place(world, Transition::SetConfig { patch: ConfigPatch::from(state.config.clone()) });
        self.adopt_tick(state, world);
    }

    /// Ingest newest-first windows, oldest-first, interventions first.
    fn ingest_windows(
        &mut self,
        interventions: Vec<InterventionRecord>,
        feed: Vec<FeedPost>,
        events: Vec<TimelineEvent>,
        logs: Vec<LogLine>,
        world: &mut WorldState,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        report.absorb(self.ingest_window(Stream::Interventions, interventions, world, |record| {
            Transition::ApplyIntervention { record }
        }));
        report.absorb(self.ingest_window(Stream::Feed, feed, world, |post| Transition::PushFeed { post }));
        report.absorb(self.ingest_window(Stream::Events, events, world, |event| Transition::PushEvent { event }));
        report.absorb(self.ingest_window(Stream::Logs, logs, world, |log| Transition::PushLog { log }));
        report
    }

    fn ingest_window<T: StreamItem>(
        &mut self,
        stream: Stream,
        newest_first: Vec<T>,
        world: &mut WorldState,
        wrap: impl Fn(T) -> Transition,
    ) -> IngestReport {
        let limit = self.remote_tick;
        let mut report = IngestReport::default();
        for item in newest_first.into_iter().rev().filter(|item| item.tick() <= limit) {
            if self.claim(stream, item.id()) {
                apply_in_place(world, wrap(item));
                report.ingested += 1;
            } else {
                report.duplicates += 1;
            }
        }
        report
    }

    fn ingest_one<T: StreamItem>(
        &mut self,
        stream: Stream,
        item: T,
        world: &mut WorldState,
        wrap: impl FnOnce(T) -> Transition,
    ) -> IngestReport {
        if item.tick() > self.remote_tick {
            SyncCounters::bump(&self.counters.items_deferred);
            debug!(
                stream = stream.as_str(),
                id = item.id(),
                tick = item.tick(),
                remote_tick = self.remote_tick,
                "Deferring push item ahead of remote tick"
            );
            return IngestReport { deferred: 1, ..IngestReport::default() };
        }
        if self.claim(stream, item.id()) {
            apply_in_place(world, wrap(item));
            IngestReport { ingested: 1, ..IngestReport::default() }
        } else {
            IngestReport { duplicates: 1, ..IngestReport::default() }
        }
    }

    fn claim(&mut self, stream: Stream, id: &str) -> bool {
        let fresh = self.dedup.claim(stream, id);
        if fresh {
            SyncCounters::bump(&self.counters.items_ingested);
        } else {
            SyncCounters::bump(&self.counters.duplicates_skipped);
        }
        fresh
    }
}

fn tick_arg(tick: u64) -> i64 {
    i64::try_from(tick).unwrap_or(i64::MAX)
}
