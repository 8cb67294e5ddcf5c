//! Deterministic generator — the only source of "randomness" in worldline.
//!
//! Every derived quantity is `hash01(seed * k1 + agent * k2 + tick * k3 + salt)`
//! with a distinct multiplier set per field. Nothing is stored, so the world
//! for a given seed can be reproduced at any tick without replaying history:
//!
//! ```text
//! (seed, agent, tick, salt) ──hash01──▶ [0, 1) ──map──▶ mood / x / persona trait
//! ```

use std::collections::BTreeMap;

use crate::types::{
    AgeBand, AgentId, AgentProfile, AgentSample, AgentState, BehaviorProfile, BigFive,
    CognitiveState, CoreAffect, DiurnalPattern, EconomicBand, Evidence, Gender, GroupProfile,
    Identity, InfluenceTier, IssueStance, MemoryHit, MoralFoundations, Psychometrics, Sentiment,
    SocialStatus, SocialStratum, ToolCall,
};

/// Trigonometric hash from a real number onto `[0, 1)`. Not cryptographic.
#[must_use]
pub fn hash01(n: f64) -> f64 {
    let x = n.sin() * 10_000.0;
    let v = x - x.floor();
    // `x - floor(x)` can round up to exactly 1.0 for tiny negative fractions.
    if v >= 1.0 { 0.0 } else { v }
}

/// Multipliers for one derived field.
#[derive(Debug, Clone, Copy)]
struct Field {
    seed: f64,
    agent: f64,
    tick: f64,
    salt: f64,
}

impl Field {
    const fn new(seed: f64, agent: f64, tick: f64, salt: f64) -> Self {
        Self { seed, agent, tick, salt }
    }

    fn at(self, seed: u64, agent: AgentId, tick: u64) -> f64 {
        hash01(
            seed as f64 * self.seed
                + f64::from(agent.0) * self.agent
                + tick as f64 * self.tick
                + self.salt,
        )
    }

    fn fixed(self, seed: u64, agent: AgentId) -> f64 {
        self.at(seed, agent, 0)
    }
}

// Per-tick fields.
const MOOD: Field = Field::new(1.31, 7.13, 0.071, 11.0);
const STANCE: Field = Field::new(2.17, 5.71, 0.043, 23.0);
const RESOURCES: Field = Field::new(3.07, 3.37, 0.029, 37.0);
const POS_X: Field = Field::new(4.19, 9.41, 0.0, 41.0);
const POS_Y: Field = Field::new(5.23, 8.29, 0.0, 53.0);
const DRIFT: Field = Field::new(6.11, 2.93, 0.0, 67.0);
const EVIDENCE: Field = Field::new(7.03, 6.67, 0.113, 71.0);

// Persona fields.
const NAME_FIRST: Field = Field::new(1.7, 13.1, 0.0, 101.0);
const NAME_LAST: Field = Field::new(2.3, 17.9, 0.0, 103.0);
const GROUP: Field = Field::new(3.1, 19.3, 0.0, 107.0);
const AGE: Field = Field::new(3.7, 23.9, 0.0, 109.0);
const GENDER: Field = Field::new(4.3, 29.3, 0.0, 113.0);
const COUNTRY: Field = Field::new(4.9, 31.7, 0.0, 127.0);
const PROFESSION: Field = Field::new(5.3, 37.1, 0.0, 131.0);
const TRAIT_BASE: f64 = 137.0;
const INFLUENCE: Field = Field::new(6.7, 43.1, 0.0, 149.0);
const ECONOMY: Field = Field::new(7.1, 47.3, 0.0, 151.0);
const DIURNAL: Field = Field::new(7.9, 53.9, 0.0, 157.0);
const AROUSAL: Field = Field::new(8.3, 59.3, 0.0, 163.0);
const ISSUE: Field = Field::new(8.9, 61.7, 0.0, 167.0);

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bao", "Chen", "Dana", "Emeka", "Farah", "Goran", "Hana", "Ines", "Jun", "Kofi",
    "Lena", "Mateo", "Nia", "Omar", "Priya", "Quinn", "Rui", "Sana", "Tomas",
];
const LAST_NAMES: &[&str] = &[
    "Abe", "Bianchi", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Huang", "Ivanova",
    "Jensen", "Kim", "Lopez", "Moreau", "Nakamura", "Okafor", "Petrov",
];
const COUNTRIES: &[(&str, &str)] = &[
    ("CN", "Shanghai"),
    ("US", "Chicago"),
    ("DE", "Berlin"),
    ("BR", "Recife"),
    ("IN", "Pune"),
    ("NG", "Lagos"),
    ("FR", "Lyon"),
    ("JP", "Osaka"),
];
const PROFESSIONS: &[(&str, &str)] = &[
    ("teacher", "education"),
    ("nurse", "healthcare"),
    ("engineer", "technology"),
    ("journalist", "media"),
    ("shop owner", "retail"),
    ("student", "academia"),
    ("civil servant", "policy"),
    ("driver", "logistics"),
];
const ACTIONS: &[&str] = &["idle", "post", "reply", "like", "share", "follow", "lurk"];
const TOPICS: &[&str] = &["housing", "climate", "wages", "policing", "education"];

/// Static group catalogue: key, label, stratum, norm summary.
const GROUPS: &[(&str, &str, SocialStratum, &str)] = &[
    ("progressive", "Progressive Urbanites", SocialStratum::UpperMiddle, "values inclusion and reform"),
    ("conservative", "Traditionalists", SocialStratum::Middle, "values order and continuity"),
    ("moderate", "Pragmatic Middle", SocialStratum::Middle, "prefers compromise"),
    ("activist", "Grassroots Activists", SocialStratum::Working, "mobilises around grievances"),
    ("disengaged", "Disengaged Scrollers", SocialStratum::Precarious, "rarely takes a side"),
];

fn pick<'a, T>(items: &'a [T], unit: f64) -> &'a T {
    // `unit` is in [0, 1) so the index is always in bounds.
    let idx = ((unit * items.len() as f64) as usize).min(items.len() - 1);
    &items[idx]
}

fn signed(unit: f64) -> f64 {
    unit * 2.0 - 1.0
}

/// Keys of all group profiles, in catalogue order.
#[must_use]
pub fn group_keys() -> Vec<&'static str> {
    GROUPS.iter().map(|(key, ..)| *key).collect()
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Derive an agent's profile from `(seed, id)`.
#[must_use]
pub fn derive_profile(seed: u64, id: AgentId) -> AgentProfile {
    let first = pick(FIRST_NAMES, NAME_FIRST.fixed(seed, id));
    let last = pick(LAST_NAMES, NAME_LAST.fixed(seed, id));
    let (group_key, ..) = pick(GROUPS, GROUP.fixed(seed, id));
    let (country, city) = pick(COUNTRIES, COUNTRY.fixed(seed, id));
    let (profession, domain) = pick(PROFESSIONS, PROFESSION.fixed(seed, id));

    let trait_at = |k: f64| {
        hash01(seed as f64 * (1.1 + k * 0.37) + f64::from(id.0) * (3.3 + k * 1.9) + TRAIT_BASE + k)
    };

    let gender_unit = GENDER.fixed(seed, id);
    let gender = if gender_unit < 0.48 {
        Gender::Male
    } else if gender_unit < 0.96 {
        Gender::Female
    } else {
        Gender::Unknown
    };

    let influence_unit = INFLUENCE.fixed(seed, id);
    let influence_tier = if influence_unit > 0.95 {
        InfluenceTier::Elite
    } else if influence_unit > 0.8 {
        InfluenceTier::OpinionLeader
    } else {
        InfluenceTier::OrdinaryUser
    };

    let economic_band = *pick(
        &[EconomicBand::Low, EconomicBand::Medium, EconomicBand::Medium, EconomicBand::High],
        ECONOMY.fixed(seed, id),
    );
    let diurnal = *pick(
        &[DiurnalPattern::Morning, DiurnalPattern::Afternoon, DiurnalPattern::Evening, DiurnalPattern::Night],
        DIURNAL.fixed(seed, id),
    );

    let initial = initial_state(seed, id);
    let arousal = AROUSAL.fixed(seed, id);
    let topic = pick(TOPICS, ISSUE.fixed(seed, id));

    AgentProfile {
        id,
        name: format!("{first} {last}"),
        group: (*group_key).to_string(),
        identity: Identity {
            username: format!("{}_{}", first.to_lowercase(), id.0),
            age_band: *pick(&AgeBand::ALL, AGE.fixed(seed, id)),
            gender,
            country: (*country).to_string(),
            region_city: (*city).to_string(),
            profession: (*profession).to_string(),
            domain_of_expertise: vec![(*domain).to_string()],
        },
        psychometrics: Psychometrics {
            big_five: BigFive {
                O: trait_at(0.0),
                C: trait_at(1.0),
                E: trait_at(2.0),
                A: trait_at(3.0),
                N: trait_at(4.0),
            },
            moral_foundations: MoralFoundations {
                care: trait_at(5.0),
                fairness: trait_at(6.0),
                loyalty: trait_at(7.0),
                authority: trait_at(8.0),
                sanctity: trait_at(9.0),
            },
        },
        social_status: SocialStatus {
            influence_tier,
            economic_band,
            network_size_proxy: (trait_at(10.0) * 5.0).floor().min(4.0) as u8,
        },
        behavior_profile: BehaviorProfile {
            posts_per_day: 0.5 + trait_at(11.0) * 9.5,
            diurnal_pattern: vec![diurnal],
            civility: trait_at(12.0),
            evidence_citation: trait_at(13.0),
        },
        cognitive_state: CognitiveState {
            core_affect: CoreAffect {
                sentiment: Sentiment::from_mood(initial.mood, arousal),
                arousal,
            },
            issue_stances: vec![IssueStance {
                topic: (*topic).to_string(),
                support: initial.stance,
                certainty: trait_at(14.0),
            }],
        },
    }
}

/// Derive every group profile from the seed.
#[must_use]
pub fn derive_groups(seed: u64) -> BTreeMap<String, GroupProfile> {
    GROUPS
        .iter()
        .enumerate()
        .map(|(i, (key, label, stratum, norms))| {
            let k = i as f64;
            let unit = |salt: f64| hash01(seed as f64 * 0.917 + k * 12.7 + salt);
            let profile = GroupProfile {
                key: (*key).to_string(),
                label: (*label).to_string(),
                dominant_stratum: *stratum,
                cohesion: unit(211.0),
                polarization: unit(223.0),
                trust_climate: unit(227.0),
                norm_summary: (*norms).to_string(),
            };
            ((*key).to_string(), profile)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-tick state
// ---------------------------------------------------------------------------

/// Mutable state an agent starts with (tick 0).
#[must_use]
pub fn initial_state(seed: u64, id: AgentId) -> AgentState {
    state_at(seed, id, 0)
}

/// Derived mood/stance/resources/evidence of an agent at `tick`.
#[must_use]
pub fn state_at(seed: u64, id: AgentId, tick: u64) -> AgentState {
    let mood = signed(MOOD.at(seed, id, tick));
    let stance = signed(STANCE.at(seed, id, tick));
    let resources = RESOURCES.at(seed, id, tick);
    let action = pick(ACTIONS, EVIDENCE.at(seed, id, tick));

    AgentState {
        mood,
        stance,
        resources,
        last_action: (*action).to_string(),
        evidence: evidence_at(seed, id, tick, action),
    }
}

fn evidence_at(seed: u64, id: AgentId, tick: u64, action: &str) -> Evidence {
    if tick == 0 {
        return Evidence::default();
    }
    let unit = EVIDENCE.at(seed, id, tick);
    let hits = 1 + (unit * 3.0) as usize;
    let memory_hits = (0..hits)
        .map(|i| {
            let score = hash01(unit * 97.0 + i as f64 * 3.1);
            MemoryHit {
                id: format!("mem-{}-{tick}-{i}", id.0),
                text: format!("recalled a post about {}", pick(TOPICS, score)),
                score,
            }
        })
        .collect();
    Evidence {
        memory_hits,
        reasoning_summary: format!("chose to {action} at tick {tick}"),
        tool_calls: vec![ToolCall {
            id: format!("tool-{}-{tick}", id.0),
            name: "feed_search".to_string(),
            status: "ok".to_string(),
            latency_ms: 20.0 + unit * 180.0,
        }],
    }
}

/// Position and derived values for rendering one agent at one tick.
///
/// Positions orbit a fixed home point, so `sample_agent(.., t)` is O(1) for
/// any `t` and identical on every call.
#[must_use]
pub fn sample_agent(seed: u64, id: AgentId, tick: u64, world_size: u32) -> AgentSample {
    let size = f64::from(world_size.max(1));
    let home_x = POS_X.fixed(seed, id) * size;
    let home_y = POS_Y.fixed(seed, id) * size;
    let phase = DRIFT.fixed(seed, id) * std::f64::consts::TAU;
    let radius = size * 0.02;
    let angle = phase + tick as f64 * 0.05;
    let state = state_at(seed, id, tick);

    AgentSample {
        x: (home_x + radius * angle.cos()).clamp(0.0, size),
        y: (home_y + radius * angle.sin()).clamp(0.0, size),
        mood: state.mood,
        stance: state.stance,
        resources: state.resources,
    }
}

/// Deterministic unit value for simulator decisions that are not tied to an agent.
#[must_use]
pub fn world_unit(seed: u64, tick: u64, salt: f64) -> f64 {
    hash01(seed as f64 * 0.613 + tick as f64 * 0.389 + salt)
}
