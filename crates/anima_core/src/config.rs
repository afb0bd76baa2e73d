use crate::error::{AnimaError, AnimaResult};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimaConfig {
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub emotion: EmotionConfig,
    pub biology: BiologyConfig,
    pub interaction: InteractionConfig,
    pub decision: DecisionConfig,
}

impl AnimaConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and the result is validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AnimaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist or is invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANIMA_TICK_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.decision.tick_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_TOKEN_BUDGET") {
            if let Ok(n) = v.parse() {
                self.retrieval.token_budget = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_UTC_OFFSET_MINUTES") {
            if let Ok(n) = v.parse() {
                self.biology.utc_offset_minutes = Some(n);
            }
        }
    }

    /// Reject configurations the engines cannot run with.
    pub fn validate(&self) -> AnimaResult<()> {
        self.memory.validate()?;
        self.retrieval.validate()?;
        self.emotion.validate()?;
        self.biology.validate()?;
        self.interaction.validate()?;
        self.decision.validate()?;
        Ok(())
    }
}

fn ensure(cond: bool, msg: &str) -> AnimaResult<()> {
    if cond {
        Ok(())
    } else {
        Err(AnimaError::invalid(msg))
    }
}

fn unit(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

// ============================================================================
// Memory decay & lifecycle
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// k1: weight of ln(1 + reinforcement_count)
    pub reinforcement_weight: f32,
    /// k2: weight of the emotional bonus
    pub emotion_weight: f32,
    /// k3: weight of importance
    pub importance_weight: f32,
    /// k4: weight of context relevance
    pub context_weight: f32,
    /// k5: penalty per unit of recall difficulty
    pub difficulty_penalty: f32,
    /// Floor for the effective strength (days) so retention never divides by ~0
    pub min_effective_strength: f32,
    /// c0 + c1 * confidence scales the retention
    pub confidence_base: f32,
    pub confidence_weight: f32,

    /// Strength below (forget_threshold - importance * importance_threshold_bonus) is forgotten
    pub forget_threshold: f32,
    pub importance_threshold_bonus: f32,
    /// Forgotten records older than this are physically deleted
    pub retention_days: i64,

    /// Low-quality sweep: candidates below this importance...
    pub low_quality_importance: f32,
    /// ...and not reinforced for this many days...
    pub low_quality_idle_days: i64,
    /// ...are forgotten if 0.4*strength + 0.4*importance + 0.2*confidence falls under this floor
    pub low_quality_floor: f32,

    /// Recall difficulty: content length (chars) considered maximally hard
    pub difficulty_length_chars: usize,
    /// Tokens longer than this count as "long"
    pub difficulty_long_token_chars: usize,

    /// How often the background job runs `maintenance()`
    pub maintenance_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            reinforcement_weight: 2.0,
            emotion_weight: 2.0,
            importance_weight: 3.0,
            context_weight: 1.0,
            difficulty_penalty: 1.5,
            min_effective_strength: 0.1,
            confidence_base: 0.6,
            confidence_weight: 0.4,
            forget_threshold: 0.2,
            importance_threshold_bonus: 0.15,
            retention_days: 30,
            low_quality_importance: 0.3,
            low_quality_idle_days: 30,
            low_quality_floor: 0.15,
            difficulty_length_chars: 200,
            difficulty_long_token_chars: 8,
            maintenance_interval_secs: 3600,
        }
    }
}

impl MemoryConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(
            self.min_effective_strength > 0.0,
            "memory.min_effective_strength must be positive",
        )?;
        ensure(
            [
                self.reinforcement_weight,
                self.emotion_weight,
                self.importance_weight,
                self.context_weight,
                self.difficulty_penalty,
                self.confidence_base,
                self.confidence_weight,
            ]
            .iter()
            .all(|w| *w >= 0.0),
            "memory decay coefficients must be non-negative",
        )?;
        ensure(unit(self.forget_threshold), "memory.forget_threshold must be in [0, 1]")?;
        ensure(self.retention_days >= 0, "memory.retention_days must be non-negative")?;
        ensure(self.difficulty_length_chars > 0, "memory.difficulty_length_chars must be positive")?;
        ensure(
            self.maintenance_interval_secs > 0,
            "memory.maintenance_interval_secs must be positive",
        )
    }
}

// ============================================================================
// Retrieval ranking
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub similarity_weight: f32,
    pub recency_weight: f32,
    pub importance_weight: f32,
    pub access_weight: f32,
    pub strength_weight: f32,

    /// Weights for general-knowledge ranking
    pub knowledge_similarity_weight: f32,
    pub knowledge_recency_weight: f32,
    pub knowledge_importance_weight: f32,
    pub knowledge_confidence_weight: f32,

    /// Recency score is e^(-age_days / half_life_days)
    pub half_life_days: f32,
    pub top_k: usize,
    pub min_similarity: f32,
    /// Token budget for assembled context
    pub token_budget: usize,
    /// Reinforce records returned by a recall
    pub reinforce_on_recall: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.5,
            recency_weight: 0.2,
            importance_weight: 0.15,
            access_weight: 0.075,
            strength_weight: 0.075,
            knowledge_similarity_weight: 0.5,
            knowledge_recency_weight: 0.15,
            knowledge_importance_weight: 0.2,
            knowledge_confidence_weight: 0.15,
            half_life_days: 30.0,
            top_k: 10,
            min_similarity: 0.3,
            token_budget: 2000,
            reinforce_on_recall: true,
        }
    }
}

impl RetrievalConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(
            [
                self.similarity_weight,
                self.recency_weight,
                self.importance_weight,
                self.access_weight,
                self.strength_weight,
                self.knowledge_similarity_weight,
                self.knowledge_recency_weight,
                self.knowledge_importance_weight,
                self.knowledge_confidence_weight,
            ]
            .iter()
            .all(|w| *w >= 0.0),
            "retrieval weights must be non-negative",
        )?;
        ensure(self.half_life_days > 0.0, "retrieval.half_life_days must be positive")?;
        ensure(
            (-1.0..=1.0).contains(&self.min_similarity),
            "retrieval.min_similarity must be in [-1, 1]",
        )
    }
}

// ============================================================================
// Emotion transitions
// ============================================================================

/// Transition durations in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Pairs inside a similarity group (e.g. happy/excited/touched)
    pub similar_secs: f32,
    /// Calm -> any active state
    pub activation_secs: f32,
    /// Positive source -> calm
    pub recovery_fast_secs: f32,
    /// Deepest negative source -> calm
    pub recovery_slow_secs: f32,
    /// Positive <-> negative
    pub cross_valence_secs: f32,
    /// Everything else
    pub default_secs: f32,
    /// Floor after intensity adjustment
    pub min_secs: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            similar_secs: 30.0,
            activation_secs: 45.0,
            recovery_fast_secs: 60.0,
            recovery_slow_secs: 900.0,
            cross_valence_secs: 600.0,
            default_secs: 180.0,
            min_secs: 1.0,
        }
    }
}

impl EmotionConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(self.min_secs > 0.0, "emotion.min_secs must be positive")?;
        ensure(
            [
                self.similar_secs,
                self.activation_secs,
                self.recovery_fast_secs,
                self.recovery_slow_secs,
                self.cross_valence_secs,
                self.default_secs,
            ]
            .iter()
            .all(|s| *s >= 0.0),
            "emotion durations must be non-negative",
        )?;
        ensure(
            self.recovery_fast_secs <= self.recovery_slow_secs,
            "emotion.recovery_fast_secs must not exceed recovery_slow_secs",
        )
    }
}

// ============================================================================
// Biological clock
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BiologyConfig {
    /// Fraction of fatigue recovered per idle minute
    pub recovery_rate_per_minute: f32,
    /// An accumulation with no activity for this long is replaced, not extended
    pub expiry_minutes: i64,
    /// Fatigue below this is discarded entirely
    pub discard_threshold: f32,
    /// energy = baseline * (1 - fatigue_impact * fatigue)
    pub fatigue_impact: f32,
    pub rest_energy_threshold: f32,
    pub rest_fatigue_threshold: f32,
    pub sleepy_energy_threshold: f32,
    /// Offset used for time-of-day; `None` uses the host's local zone
    pub utc_offset_minutes: Option<i32>,
}

impl Default for BiologyConfig {
    fn default() -> Self {
        Self {
            recovery_rate_per_minute: 0.02,
            expiry_minutes: 120,
            discard_threshold: 0.01,
            fatigue_impact: 0.6,
            rest_energy_threshold: 0.3,
            rest_fatigue_threshold: 0.7,
            sleepy_energy_threshold: 0.35,
            utc_offset_minutes: None,
        }
    }
}

impl BiologyConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(
            self.recovery_rate_per_minute > 0.0 && self.recovery_rate_per_minute < 1.0,
            "biology.recovery_rate_per_minute must be in (0, 1)",
        )?;
        ensure(self.expiry_minutes > 0, "biology.expiry_minutes must be positive")?;
        ensure(unit(self.fatigue_impact), "biology.fatigue_impact must be in [0, 1]")?;
        if let Some(offset) = self.utc_offset_minutes {
            ensure(
                offset.abs() < 24 * 60,
                "biology.utc_offset_minutes must be within one day",
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Interaction tracking
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Hard cap on stored entries (oldest evicted first)
    pub capacity: usize,
    /// Entries older than this are evicted on every write
    pub retention_minutes: i64,
    /// Window used for statistics
    pub stats_window_minutes: i64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            retention_minutes: 24 * 60,
            stats_window_minutes: 60,
        }
    }
}

impl InteractionConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(self.capacity > 0, "interaction.capacity must be positive")?;
        ensure(self.retention_minutes > 0, "interaction.retention_minutes must be positive")?;
        ensure(
            self.stats_window_minutes > 0,
            "interaction.stats_window_minutes must be positive",
        )
    }
}

// ============================================================================
// Decision scoring
// ============================================================================

/// Per-factor weights; must sum to 1.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub time: f32,
    pub emotion: f32,
    pub relation: f32,
    pub context: f32,
    pub curiosity: f32,
    pub urgency: f32,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            time: 0.1,
            emotion: 0.25,
            relation: 0.2,
            context: 0.15,
            curiosity: 0.1,
            urgency: 0.2,
        }
    }
}

impl FactorWeights {
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.time,
            self.emotion,
            self.relation,
            self.context,
            self.curiosity,
            self.urgency,
        ]
    }

    pub fn sum(&self) -> f32 {
        self.as_array().iter().sum()
    }
}

/// Speak threshold per relationship tier. Lower bar for closer relations.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub primary: f32,
    pub close: f32,
    pub friend: f32,
    pub acquaintance: f32,
    pub stranger: f32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            primary: 0.45,
            close: 0.5,
            friend: 0.55,
            acquaintance: 0.65,
            stranger: 0.75,
        }
    }
}

/// Signal values used when a provider fails or is missing.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FallbackSignals {
    pub time: f32,
    pub emotion: f32,
    pub relation: f32,
    pub context: f32,
    pub curiosity: f32,
    pub urgency: f32,
}

impl Default for FallbackSignals {
    fn default() -> Self {
        Self {
            time: 0.5,
            emotion: 0.3,
            relation: 0.3,
            context: 0.0,
            curiosity: 0.2,
            urgency: 0.0,
        }
    }
}

impl FallbackSignals {
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.time,
            self.emotion,
            self.relation,
            self.context,
            self.curiosity,
            self.urgency,
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub weights: FactorWeights,
    pub thresholds: TierThresholds,
    pub fallback: FallbackSignals,
    /// Urgency at or above this speaks immediately
    pub immediate_urgency: f32,
    pub tick_interval_secs: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            thresholds: TierThresholds::default(),
            fallback: FallbackSignals::default(),
            immediate_urgency: 0.8,
            tick_interval_secs: 10,
        }
    }
}

impl DecisionConfig {
    fn validate(&self) -> AnimaResult<()> {
        ensure(
            self.weights.as_array().iter().all(|w| *w >= 0.0),
            "decision.weights must be non-negative",
        )?;
        ensure(
            (self.weights.sum() - 1.0).abs() <= 1e-3,
            "decision.weights must sum to 1",
        )?;
        let t = &self.thresholds;
        ensure(
            [t.primary, t.close, t.friend, t.acquaintance, t.stranger]
                .iter()
                .all(|v| unit(*v)),
            "decision.thresholds must be in [0, 1]",
        )?;
        ensure(
            t.primary <= t.close
                && t.close <= t.friend
                && t.friend <= t.acquaintance
                && t.acquaintance <= t.stranger,
            "decision.thresholds must not decrease from primary to stranger",
        )?;
        ensure(
            self.fallback.as_array().iter().all(|v| unit(*v)),
            "decision.fallback values must be in [0, 1]",
        )?;
        ensure(self.tick_interval_secs > 0, "decision.tick_interval_secs must be positive")
    }
}

// ============================================================================
// Tests
// ============================================================================
