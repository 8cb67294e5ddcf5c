//! Configuration for a worldline session.
//!
//! Maps directly to `worldline.toml`. Every field has a serde default so a
//! partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

use crate::types::SimConfig;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorldlineConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Capacities of the bounded streams.
    #[serde(default)]
    pub buffers: BufferLimits,
    /// Initial simulation parameters.
    #[serde(default)]
    pub simulation: SimulationSection,
    /// Local mock simulator tuning.
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Remote authority settings. Local mode when `base_url` is absent.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Push-channel transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Dedup set sizing.
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl WorldlineConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `WorldlineError::Config` if the TOML is invalid or the
    /// resulting values are inconsistent.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| crate::WorldlineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `WorldlineError::Config` describing the first violation.
    pub fn validate(&self) -> crate::error::Result<()> {
        let err = |msg: &str| Err(crate::WorldlineError::Config(msg.to_string()));
        if self.transport.backoff_floor_ms == 0 {
            return err("transport.backoff_floor_ms must be positive");
        }
        if self.transport.backoff_ceiling_ms < self.transport.backoff_floor_ms {
            return err("transport.backoff_ceiling_ms must be >= backoff_floor_ms");
        }
        if self.simulator.timer_period_ms == 0 {
            return err("simulator.timer_period_ms must be positive");
        }
        if self.remote.poll_interval_ms == 0 || self.remote.hydrate_retry_ms == 0 {
            return err("remote intervals must be positive");
        }
        if self.dedup.capacity_per_stream < self.remote.largest_window().saturating_mul(DEDUP_WINDOW_FACTOR) {
            return err("dedup.capacity_per_stream must be at least twice the largest remote window");
        }
        Ok(())
    }

    /// Dedup capacity per stream, raised to twice the largest remote window
    /// so ids a poll can still return are never forgotten.
    #[must_use]
    pub fn dedup_capacity(&self) -> usize {
        self.dedup
            .capacity_per_stream
            .max(self.remote.largest_window().saturating_mul(DEDUP_WINDOW_FACTOR))
            .max(1)
    }

    /// Whether a remote authority is configured.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.remote.base_url.is_some()
    }

    /// Push-channel URL: explicit `transport.ws_url`, else derived from
    /// `remote.base_url` by swapping the scheme and appending `/ws`.
    #[must_use]
    pub fn push_url(&self) -> Option<String> {
        if let Some(url) = &self.transport.ws_url {
            return Some(url.clone());
        }
        let base = self.remote.base_url.as_deref()?.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        Some(format!("{ws}/ws"))
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Capacity of each bounded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferLimits {
    /// Feed posts.
    #[serde(default = "default_2000")]
    pub max_feed: usize,
    /// Timeline events.
    #[serde(default = "default_2500")]
    pub max_events: usize,
    /// Simulation log lines.
    #[serde(default = "default_4000")]
    pub max_logs: usize,
    /// Intervention records.
    #[serde(default = "default_120")]
    pub max_interventions: usize,
    /// Local diagnostic lines.
    #[serde(default = "default_500")]
    pub max_diagnostic: usize,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_feed: 2000,
            max_events: 2500,
            max_logs: 4000,
            max_interventions: 120,
            max_diagnostic: 500,
        }
    }
}

/// Initial simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Seeded into the world model at startup.
    #[serde(flatten)]
    pub config: SimConfig,
    /// Initial speed multiplier.
    #[serde(default = "default_1_0")]
    pub initial_speed: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            config: SimConfig::default(),
            initial_speed: 1.0,
        }
    }
}

/// Local mock simulator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Period of the driving timer.
    #[serde(default = "default_100")]
    pub timer_period_ms: u64,
    /// Upper bound on agents touched per advanced tick.
    #[serde(default = "default_5")]
    pub max_agent_mutations_per_tick: usize,
    /// Emit a feed post every N ticks.
    #[serde(default = "default_3")]
    pub post_every_ticks: u64,
    /// Emit a timeline event every N ticks.
    #[serde(default = "default_5_u64")]
    pub event_every_ticks: u64,
    /// Emit a log line every N ticks.
    #[serde(default = "default_1")]
    pub log_every_ticks: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            timer_period_ms: 100,
            max_agent_mutations_per_tick: 5,
            post_every_ticks: 3,
            event_every_ticks: 5,
            log_every_ticks: 1,
        }
    }
}

/// Remote authority settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base HTTP URL, e.g. `http://localhost:8000`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Steady-state poll period.
    #[serde(default = "default_2000_u64")]
    pub poll_interval_ms: u64,
    /// Fixed hydration retry period.
    #[serde(default = "default_3000")]
    pub hydrate_retry_ms: u64,
    /// Hard timeout for any HTTP request.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Feed window fetched per pass.
    #[serde(default = "default_200")]
    pub feed_window: usize,
    /// Event window fetched per pass.
    #[serde(default = "default_200")]
    pub events_window: usize,
    /// Log window fetched per pass.
    #[serde(default = "default_200")]
    pub logs_window: usize,
    /// Intervention window fetched per pass.
    #[serde(default = "default_120")]
    pub interventions_window: usize,
    /// Quiet period before pending config edits are flushed.
    #[serde(default = "default_400")]
    pub patch_debounce_ms: u64,
}

impl RemoteConfig {
    /// The largest per-stream fetch window.
    #[must_use]
    pub fn largest_window(&self) -> usize {
        self.feed_window
            .max(self.events_window)
            .max(self.logs_window)
            .max(self.interventions_window)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            poll_interval_ms: 2000,
            hydrate_retry_ms: 3000,
            request_timeout_ms: 5000,
            feed_window: 200,
            events_window: 200,
            logs_window: 200,
            interventions_window: 120,
            patch_debounce_ms: 400,
        }
    }
}

/// Push-channel transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Explicit push URL; derived from `remote.base_url` when absent.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// First reconnect delay, and the delay after any successful connect.
    #[serde(default = "default_500_u64")]
    pub backoff_floor_ms: u64,
    /// Reconnect delay never exceeds this.
    #[serde(default = "default_30000")]
    pub backoff_ceiling_ms: u64,
    /// Ping period while connected.
    #[serde(default = "default_15000")]
    pub heartbeat_interval_ms: u64,
    /// Outbound frames held while disconnected; the oldest is dropped beyond this.
    #[serde(default = "default_256")]
    pub max_outbound_queue: usize,
    /// Event types requested on every (re)connect.
    #[serde(default = "default_event_types")]
    pub subscribe_event_types: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            backoff_floor_ms: 500,
            backoff_ceiling_ms: 30_000,
            heartbeat_interval_ms: 15_000,
            max_outbound_queue: 256,
            subscribe_event_types: default_event_types(),
        }
    }
}

/// Minimum ratio of dedup capacity to the largest remote window.
pub const DEDUP_WINDOW_FACTOR: usize = 2;

/// Dedup set sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Ids remembered per stream before the least recently seen is forgotten.
    #[serde(default = "default_16384")]
    pub capacity_per_stream: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { capacity_per_stream: 16_384 }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_event_types() -> Vec<String> {
    ["tick", "post", "event", "log", "state", "error"]
        .iter()
        .map(ToString::to_string)
        .collect()
}
fn default_1_0() -> f64 { 1.0 }
fn default_1() -> u64 { 1 }
fn default_3() -> u64 { 3 }
fn default_5() -> usize { 5 }
fn default_5_u64() -> u64 { 5 }
fn default_100() -> u64 { 100 }
fn default_120() -> usize { 120 }
fn default_200() -> usize { 200 }
fn default_256() -> usize { 256 }
fn default_400() -> u64 { 400 }
fn default_500() -> usize { 500 }
fn default_500_u64() -> u64 { 500 }
fn default_2000() -> usize { 2000 }
fn default_2000_u64() -> u64 { 2000 }
fn default_2500() -> usize { 2500 }
fn default_3000() -> u64 { 3000 }
fn default_4000() -> usize { 4000 }
fn default_5000() -> u64 { 5000 }
fn default_15000() -> u64 { 15_000 }
fn default_16384() -> usize { 16_384 }
fn default_30000() -> u64 { 30_000 }
