//! Core type definitions for the worldline world model.
//!
//! All types are serializable with camelCase field names so they can be
//! exchanged with the remote authority unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for the simulation tick.
pub const MAX_TICK: u64 = 200_000;

/// Lower and upper bound for the speed multiplier.
pub const SPEED_RANGE: (f64, f64) = (0.1, 10.0);

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Identifier of an agent. Agents are keyed by positive integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Anything stored in a bounded, tick-ordered stream.
pub trait StreamItem: Clone {
    /// Unique identifier of the item.
    fn id(&self) -> &str;
    /// Tick at which the item was emitted.
    fn tick(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Profile enums
// ---------------------------------------------------------------------------

/// Age band of an agent's persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgeBand {
    /// 18 to 24.
    #[serde(rename = "18-24")]
    Age18To24,
    /// 25 to 34.
    #[serde(rename = "25-34")]
    Age25To34,
    /// 35 to 44.
    #[serde(rename = "35-44")]
    Age35To44,
    /// 45 to 54.
    #[serde(rename = "45-54")]
    Age45To54,
    /// 55 to 64.
    #[serde(rename = "55-64")]
    Age55To64,
    /// 65 and over.
    #[serde(rename = "65+")]
    Age65Plus,
    /// Not reported.
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeBand {
    /// Every concrete band, in order.
    pub const ALL: [Self; 6] = [
        Self::Age18To24,
        Self::Age25To34,
        Self::Age35To44,
        Self::Age45To54,
        Self::Age55To64,
        Self::Age65Plus,
    ];
}

/// Self-reported gender of a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not reported.
    #[default]
    Unknown,
}

/// How far an agent's posts reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InfluenceTier {
    /// Reaches immediate followers only.
    #[default]
    OrdinaryUser,
    /// Shapes a community.
    OpinionLeader,
    /// Public figure.
    Elite,
}

/// Coarse economic standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EconomicBand {
    /// Low income.
    Low,
    /// Middle income.
    #[default]
    Medium,
    /// High income.
    High,
    /// Not reported.
    Unknown,
}

/// Time of day an agent is most active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiurnalPattern {
    /// Before noon.
    Morning,
    /// Noon to early evening.
    Afternoon,
    /// Early evening to midnight.
    Evening,
    /// After midnight.
    Night,
    /// No pattern.
    #[default]
    Unknown,
}

/// Discrete affect label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// Negative and aroused.
    Angry,
    /// Neither positive nor negative.
    #[default]
    Calm,
    /// Positive.
    Happy,
    /// Negative and quiet.
    Sad,
    /// Negative and somewhat aroused.
    Fearful,
    /// Positive and aroused.
    Surprised,
}

impl Sentiment {
    /// Map a mood in `[-1, 1]` and an arousal in `[0, 1]` onto a label.
    #[must_use]
    pub fn from_mood(mood: f64, arousal: f64) -> Self {
        match (mood, arousal) {
            (m, a) if m > 0.3 && a > 0.6 => Self::Surprised,
            (m, _) if m > 0.3 => Self::Happy,
            (m, a) if m < -0.3 && a > 0.6 => Self::Angry,
            (m, a) if m < -0.3 && a > 0.3 => Self::Fearful,
            (m, _) if m < -0.3 => Self::Sad,
            _ => Self::Calm,
        }
    }
}

/// Stratum a group is mostly drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SocialStratum {
    /// Top of the hierarchy.
    Elite,
    /// Professionals and owners.
    UpperMiddle,
    /// Salaried middle class.
    #[default]
    Middle,
    /// Wage workers.
    Working,
    /// Insecure or informal work.
    Precarious,
}

/// Severity of a log or diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Informational.
    #[default]
    Info,
    /// A success worth noting.
    Ok,
    /// A failure.
    Error,
}

/// Kind of a timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An agent did something.
    #[default]
    AgentAction,
    /// An agent said something.
    Message,
    /// An operator intervened.
    Intervention,
    /// Something needs attention.
    Alert,
    /// A marker set by the operator.
    Bookmark,
}

/// Which viewport renderers should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewportMode {
    /// Individual agents.
    #[default]
    Micro,
    /// Aggregated groups.
    Macro,
}

// ---------------------------------------------------------------------------
// Agent profile
// ---------------------------------------------------------------------------

/// Big Five personality traits, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(non_snake_case)]
pub struct BigFive {
    /// Openness.
    pub O: f64,
    /// Conscientiousness.
    pub C: f64,
    /// Extraversion.
    pub E: f64,
    /// Agreeableness.
    pub A: f64,
    /// Neuroticism.
    pub N: f64,
}

impl Default for BigFive {
    fn default() -> Self {
        Self { O: 0.5, C: 0.5, E: 0.5, A: 0.5, N: 0.5 }
    }
}

/// Moral foundations, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoralFoundations {
    /// Care / harm.
    pub care: f64,
    /// Fairness / cheating.
    pub fairness: f64,
    /// Loyalty / betrayal.
    pub loyalty: f64,
    /// Authority / subversion.
    pub authority: f64,
    /// Sanctity / degradation.
    pub sanctity: f64,
}

impl Default for MoralFoundations {
    fn default() -> Self {
        Self { care: 0.5, fairness: 0.5, loyalty: 0.5, authority: 0.5, sanctity: 0.5 }
    }
}

/// Who the agent claims to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    /// Handle shown on posts.
    pub username: String,
    /// Age band.
    pub age_band: AgeBand,
    /// Gender.
    pub gender: Gender,
    /// Country of residence.
    pub country: String,
    /// Region or city.
    pub region_city: String,
    /// Occupation.
    pub profession: String,
    /// Topics the agent speaks to with authority.
    pub domain_of_expertise: Vec<String>,
}

/// Personality and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Psychometrics {
    /// Personality traits.
    pub big_five: BigFive,
    /// Moral foundations.
    pub moral_foundations: MoralFoundations,
}

/// Reach and standing in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialStatus {
    /// Reach tier.
    pub influence_tier: InfluenceTier,
    /// Economic band.
    pub economic_band: EconomicBand,
    /// Rough follower-count bucket, 0..=4.
    pub network_size_proxy: u8,
}

/// Posting cadence and rhetoric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorProfile {
    /// Mean posting rate.
    pub posts_per_day: f64,
    /// Times of day the agent is active.
    pub diurnal_pattern: Vec<DiurnalPattern>,
    /// 0 (hostile) ..= 1 (civil).
    pub civility: f64,
    /// Share of posts that cite a source, 0 ..= 1.
    pub evidence_citation: f64,
}

/// Affect at profile-generation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreAffect {
    /// Discrete label.
    pub sentiment: Sentiment,
    /// 0 ..= 1.
    pub arousal: f64,
}

/// Position on a single topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueStance {
    /// Topic label.
    pub topic: String,
    /// -1 (oppose) ..= 1 (support).
    pub support: f64,
    /// 0 ..= 1.
    pub certainty: f64,
}

/// Affect plus issue stances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CognitiveState {
    /// Baseline affect.
    pub core_affect: CoreAffect,
    /// Positions on topics.
    pub issue_stances: Vec<IssueStance>,
}

/// Identity and psychometric attributes of an agent.
///
/// In local mode this is a pure function of `(seed, agent id)`; see
/// [`crate::generator::derive_profile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentProfile {
    /// Agent id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Key of the group the agent belongs to.
    pub group: String,
    /// Demographics.
    pub identity: Identity,
    /// Personality and values.
    pub psychometrics: Psychometrics,
    /// Reach and standing.
    #[serde(alias = "social_status")]
    pub social_status: SocialStatus,
    /// Posting behaviour.
    #[serde(alias = "behavior_profile")]
    pub behavior_profile: BehaviorProfile,
    /// Affect and stances.
    #[serde(alias = "cognitive_state")]
    pub cognitive_state: CognitiveState,
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// A retrieved memory that informed an agent's last action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MemoryHit {
    /// Memory id.
    pub id: String,
    /// Memory contents.
    pub text: String,
    /// Retrieval score.
    pub score: f64,
}

/// A tool invocation that informed an agent's last action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    /// Call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Outcome reported by the tool.
    pub status: String,
    /// Wall-clock latency.
    pub latency_ms: f64,
}

/// Why an agent did what it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Evidence {
    /// Memories retrieved for the action.
    pub memory_hits: Vec<MemoryHit>,
    /// Short rationale.
    pub reasoning_summary: String,
    /// Tools invoked for the action.
    pub tool_calls: Vec<ToolCall>,
}

/// Mutable per-agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentState {
    /// -1 ..= 1.
    pub mood: f64,
    /// -1 ..= 1.
    pub stance: f64,
    /// 0 ..= 1.
    pub resources: f64,
    /// Label of the most recent action.
    pub last_action: String,
    /// Why the last action was taken.
    pub evidence: Evidence,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            mood: 0.0,
            stance: 0.0,
            resources: 0.5,
            last_action: "idle".to_string(),
            evidence: Evidence::default(),
        }
    }
}

/// Shallow patch for [`AgentState`]. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatePatch {
    /// New mood, clamped to -1 ..= 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<f64>,
    /// New stance, clamped to -1 ..= 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<f64>,
    /// New resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<f64>,
    /// New last action label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    /// New evidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

impl AgentStatePatch {
    /// Merge this patch into `state`.
    pub fn apply_to(self, state: &mut AgentState) {
        if let Some(mood) = self.mood {
            state.mood = mood.clamp(-1.0, 1.0);
        }
        if let Some(stance) = self.stance {
            state.stance = stance.clamp(-1.0, 1.0);
        }
        if let Some(resources) = self.resources {
            state.resources = resources;
        }
        if let Some(last_action) = self.last_action {
            state.last_action = last_action;
        }
        if let Some(evidence) = self.evidence {
            state.evidence = evidence;
        }
    }
}

/// An agent: identity plus mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Agent {
    /// Identity and psychometrics.
    pub profile: AgentProfile,
    /// Mutable state.
    pub state: AgentState,
}

/// Aggregate description of a group of agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupProfile {
    /// Group key, matched by `AgentProfile::group`.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Stratum most members come from.
    pub dominant_stratum: SocialStratum,
    /// 0 ..= 1.
    pub cohesion: f64,
    /// 0 ..= 1.
    pub polarization: f64,
    /// 0 ..= 1.
    pub trust_climate: f64,
    /// Prevailing norms in a sentence.
    pub norm_summary: String,
}

// ---------------------------------------------------------------------------
// Stream items
// ---------------------------------------------------------------------------

/// A post in the social feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    /// Unique post id.
    pub id: String,
    /// Tick the post was made at.
    pub tick: u64,
    /// Author.
    pub author_id: AgentId,
    /// Author display name.
    pub author_name: String,
    /// -1 ..= 1.
    pub emotion: f64,
    /// Post text.
    pub content: String,
    /// Like count.
    #[serde(default)]
    pub likes: u32,
}

/// An entry on the simulation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Unique event id.
    pub id: String,
    /// Tick the event happened at.
    pub tick: u64,
    /// Event kind, `type` on the wire.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Short description.
    pub title: String,
    /// Agent involved, if any.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Free-form detail.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// A line in the simulation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    /// Unique log id.
    pub id: String,
    /// Tick the line was written at.
    pub tick: u64,
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub text: String,
    /// Agent the line is about, if any.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// An operator intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    /// Unique intervention id.
    pub id: String,
    /// Tick the intervention was applied at.
    pub tick: u64,
    /// Operator command text.
    pub command: String,
    /// Targeted agent, if any.
    #[serde(default)]
    pub target_agent_id: Option<AgentId>,
}

/// A local diagnostic line (sync failures, rejected interventions, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticLine {
    /// Unique diagnostic id.
    pub id: String,
    /// World tick when reported.
    pub tick: u64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub at_ms: i64,
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub text: String,
}

macro_rules! impl_stream_item {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl StreamItem for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn tick(&self) -> u64 {
                    self.tick
                }
            }
        )+
    };
}

impl_stream_item!(FeedPost, TimelineEvent, LogLine, InterventionRecord, DiagnosticLine);

// ---------------------------------------------------------------------------
// Simulation config
// ---------------------------------------------------------------------------

/// Flat record of simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Generator seed.
    pub seed: u64,
    /// Number of agents.
    pub agent_count: u32,
    /// Side length of the square world.
    pub world_size: u32,
    /// Simulation rate at speed 1.
    pub ticks_per_second: f64,
    /// Agents sampled for rendering.
    pub sample_agents: u32,
    /// Preferred viewport.
    pub viewport_mode: ViewportMode,
    /// Scenario prompt.
    pub scenario_text: String,
    /// Experiment label.
    pub experiment_name: String,
    /// Whether the scenario design is finished.
    pub design_ready: bool,
    /// Sampling temperature for agent reasoning.
    pub llm_temperature: f64,
    /// Token limit per agent call.
    pub llm_max_tokens: u32,
    /// Agent calls per tick.
    pub llm_calls_per_tick: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agent_count: 30,
            world_size: 1000,
            ticks_per_second: 1.0,
            sample_agents: 30,
            viewport_mode: ViewportMode::Micro,
            scenario_text: String::new(),
            experiment_name: "experiment_1".to_string(),
            design_ready: false,
            llm_temperature: 0.7,
            llm_max_tokens: 256,
            llm_calls_per_tick: 4,
        }
    }
}

/// Shallow patch for [`SimConfig`]. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    /// Generator seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of agents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_count: Option<u32>,
    /// Side length of the square world.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_size: Option<u32>,
    /// Simulation rate at speed 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks_per_second: Option<f64>,
    /// Agents sampled for rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_agents: Option<u32>,
    /// Preferred viewport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_mode: Option<ViewportMode>,
    /// Scenario prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_text: Option<String>,
    /// Experiment label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    /// Whether the scenario design is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_ready: Option<bool>,
    /// Sampling temperature for agent reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_temperature: Option<f64>,
    /// Token limit per agent call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_max_tokens: Option<u32>,
    /// Agent calls per tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_calls_per_tick: Option<u32>,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $src.$field {
                $dst.$field = value;
            }
        )+
    };
}

macro_rules! overlay_fields {
    ($dst:expr, $src:expr; $($field:ident),+ $(,)?) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field;
            }
        )+
    };
}

impl ConfigPatch {
    /// A patch that only changes the seed.
    #[must_use]
    pub fn seed(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `later` on top of `self`; later edits win field-by-field.
    pub fn absorb(&mut self, later: Self) {
        overlay_fields!(self, later;
            seed, agent_count, world_size, ticks_per_second, sample_agents,
            viewport_mode, scenario_text, experiment_name, design_ready,
            llm_temperature, llm_max_tokens, llm_calls_per_tick,
        );
    }
}

impl From<SimConfig> for ConfigPatch {
    /// A patch that overwrites every field, used when the remote authority
    /// sends its full config.
    fn from(config: SimConfig) -> Self {
        Self {
            seed: Some(config.seed),
            agent_count: Some(config.agent_count),
            world_size: Some(config.world_size),
            ticks_per_second: Some(config.ticks_per_second),
            sample_agents: Some(config.sample_agents),
            viewport_mode: Some(config.viewport_mode),
            scenario_text: Some(config.scenario_text),
            experiment_name: Some(config.experiment_name),
            design_ready: Some(config.design_ready),
            llm_temperature: Some(config.llm_temperature),
            llm_max_tokens: Some(config.llm_max_tokens),
            llm_calls_per_tick: Some(config.llm_calls_per_tick),
        }
    }
}

impl SimConfig {
    /// Shallow-merge `patch` into this config. Returns `true` if the seed changed.
    pub fn merge(&mut self, patch: ConfigPatch) -> bool {
        let old_seed = self.seed;
        merge_fields!(self, patch;
            seed, agent_count, world_size, ticks_per_second, sample_agents,
            viewport_mode, scenario_text, experiment_name, design_ready,
            llm_temperature, llm_max_tokens, llm_calls_per_tick,
        );
        self.seed != old_seed
    }
}

// ---------------------------------------------------------------------------
// Derived per-tick values
// ---------------------------------------------------------------------------

/// What a renderer needs to draw one agent at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSample {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Mood at the tick.
    pub mood: f64,
    /// Stance at the tick.
    pub stance: f64,
    /// Resources at the tick.
    pub resources: f64,
}

/// Whether a remote authority is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No server; the mock simulator fabricates world evolution.
    #[default]
    Local,
    /// A remote authority owns content; the coordinator ingests it.
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_merge_reports_seed_change() {
        let mut config = SimConfig::default();
        assert!(!config.merge(ConfigPatch {
            scenario_text: Some("riots".into()),
            ..ConfigPatch::default()
        }));
        assert_eq!(config.scenario_text, "riots");
        assert!(config.merge(ConfigPatch::seed(7)));
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn patch_absorb_keeps_latest_edit() {
        let mut pending = ConfigPatch::seed(1);
        pending.absorb(ConfigPatch { world_size: Some(500), ..ConfigPatch::default() });
        pending.absorb(ConfigPatch::seed(2));
        assert_eq!(pending.seed, Some(2));
        assert_eq!(pending.world_size, Some(500));
    }

    #[test]
    fn wire_names_are_camel_case() {
        let post = FeedPost {
            id: "p1".into(),
            tick: 3,
            author_id: AgentId(9),
            author_name: "Ada".into(),
            emotion: 0.2,
            content: "hi".into(),
            likes: 0,
        };
        let json = serde_json::to_value(&post).expect("serialize");
        assert_eq!(json["authorId"], 9);
        assert_eq!(json["authorName"], "Ada");
    }

    #[test]
    fn event_kind_uses_type_key() {
        let raw = r#"{"id":"e1","tick":4,"type":"intervention","title":"x"}"#;
        let event: TimelineEvent = serde_json::from_str(raw).expect("parse");
        assert_eq!(event.kind, EventKind::Intervention);
        assert!(event.agent_id.is_none());
    }

    #[test]
    fn sentiment_from_mood_is_consistent() {
        assert_eq!(Sentiment::from_mood(0.8, 0.2), Sentiment::Happy);
        assert_eq!(Sentiment::from_mood(-0.8, 0.9), Sentiment::Angry);
        assert_eq!(Sentiment::from_mood(0.0, 0.9), Sentiment::Calm);
    }
}
