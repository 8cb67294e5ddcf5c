//! Wire types for the remote authority: HTTP bodies and push-channel messages.
//!
//! Field names are camelCase on the wire. Unknown fields (such as the
//! `timestamp` the server stamps on every push message) are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use worldline_core::types::{
    AgentId, AgentProfile, AgentState, AgentStatePatch, FeedPost, GroupProfile,
    InterventionRecord, LogLine, SimConfig, TimelineEvent,
};

use crate::error::FrameError;

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

/// One entry of the server's agent map in `GET /api/state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemoteAgentEntry {
    pub state: AgentState,
}

/// Body of `GET /api/state`.
///
/// Content streams are included by the server but the coordinator fetches
/// them through the bounded window endpoints instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteWorldState {
    pub config: SimConfig,
    pub tick: u64,
    pub is_running: bool,
    pub speed: f64,
    pub selected_agent_id: Option<AgentId>,
    pub agents: BTreeMap<AgentId, RemoteAgentEntry>,
    pub groups: BTreeMap<String, GroupProfile>,
}

/// Body of `GET /api/groups`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroupsResponse {
    pub groups: Vec<GroupProfile>,
}

/// Body of `POST /api/intervention`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRequest {
    pub tick: u64,
    pub command: String,
    pub target_agent_id: Option<AgentId>,
}

/// Body of `PATCH /api/state`. `None` fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_agent_id: Option<AgentId>,
}

/// Everything fetched in one hydration or poll pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteBatch {
    pub state: RemoteWorldState,
    /// Agent profiles; empty on poll passes.
    pub agents: Vec<AgentProfile>,
    /// Newest-first, as the server returns them.
    pub interventions: Vec<InterventionRecord>,
    pub feed: Vec<FeedPost>,
    pub events: Vec<TimelineEvent>,
    pub logs: Vec<LogLine>,
}

/// Per-stream window sizes for bounded fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Feed posts per fetch.
    pub feed: usize,
    /// Timeline events per fetch.
    pub events: usize,
    /// Log lines per fetch.
    pub logs: usize,
    /// Intervention records per fetch.
    pub interventions: usize,
}

impl From<&worldline_core::config::RemoteConfig> for Windows {
    fn from(config: &worldline_core::config::RemoteConfig) -> Self {
        Self {
            feed: config.feed_window,
            events: config.events_window,
            logs: config.logs_window,
            interventions: config.interventions_window,
        }
    }
}

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

/// Inbound push-channel message, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PushMessage {
    /// Handshake; carries the id the server assigned us.
    Connected { client_id: String },
    /// The server's tick pointer moved.
    TickUpdate { tick: u64, is_running: bool, speed: f64 },
    /// One agent's state changed.
    AgentUpdate { agent_id: AgentId, state: AgentStatePatch },
    PostCreated { post: FeedPost },
    EventCreated { event: TimelineEvent },
    LogAdded { log: LogLine },
    SystemLog { log: LogLine },
    /// Full state broadcast.
    SimulationState { state: Box<RemoteWorldState> },
    /// Server-side failure report.
    Error {
        error: String,
        #[serde(default)]
        details: Option<serde_json::Value>,
    },
    /// Reply to `ping`.
    Pong {},
}

impl PushMessage {
    /// Every `type` value this client understands.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "connected",
        "tick_update",
        "agent_update",
        "post_created",
        "event_created",
        "log_added",
        "system_log",
        "simulation_state",
        "error",
        "pong",
    ];

    /// Parse one text frame.
    ///
    /// # Errors
    /// [`FrameError::Malformed`] for non-JSON or a missing `type`, or a
    /// known type with a bad body; [`FrameError::UnknownType`] otherwise.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
        let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
            return Err(FrameError::Malformed("missing `type` field".into()));
        };
        if !Self::KNOWN_TYPES.contains(&kind) {
            return Err(FrameError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| FrameError::Malformed(e.to_string()))
    }

    /// The `type` discriminant, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::TickUpdate { .. } => "tick_update",
            Self::AgentUpdate { .. } => "agent_update",
            Self::PostCreated { .. } => "post_created",
            Self::EventCreated { .. } => "event_created",
            Self::LogAdded { .. } => "log_added",
            Self::SystemLog { .. } => "system_log",
            Self::SimulationState { .. } => "simulation_state",
            Self::Error { .. } => "error",
            Self::Pong {} => "pong",
        }
    }
}

/// Outbound push-channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    Subscribe { event_types: Vec<String>, agent_ids: Vec<AgentId> },
    Unsubscribe { event_types: Vec<String>, agent_ids: Vec<AgentId> },
    Ping {},
}

impl OutboundMessage {
    /// Encode as a JSON text frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        // Serializing plain enums of strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
