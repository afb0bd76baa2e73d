//! Proactive-speech decision.
//!
//! `Signals` (six factors in [0, 1] plus the situation) → [`DecisionScorer::score`]
//! → `Scores` → [`DecisionScorer::decide`] → `SpeakDecision`. Everything here
//! is a pure function of its input; nothing is persisted.

use anima_core::config::{DecisionConfig, TierThresholds};
use anima_core::sanitize_f32;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Time,
    Emotion,
    Relation,
    Context,
    Curiosity,
    Urgency,
}

impl Factor {
    /// Field order of `Signals` and the config weight arrays.
    pub const ALL: [Factor; 6] = [
        Factor::Time,
        Factor::Emotion,
        Factor::Relation,
        Factor::Context,
        Factor::Curiosity,
        Factor::Urgency,
    ];

    /// Tie-break order for the dominant factor, highest first.
    pub const PRIORITY: [Factor; 6] = [
        Factor::Urgency,
        Factor::Emotion,
        Factor::Relation,
        Factor::Context,
        Factor::Curiosity,
        Factor::Time,
    ];

    fn index(self) -> usize {
        match self {
            Factor::Time => 0,
            Factor::Emotion => 1,
            Factor::Relation => 2,
            Factor::Context => 3,
            Factor::Curiosity => 4,
            Factor::Urgency => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Factor::Time => "time",
            Factor::Emotion => "emotion",
            Factor::Relation => "relation",
            Factor::Context => "context",
            Factor::Curiosity => "curiosity",
            Factor::Urgency => "urgency",
        }
    }

    /// Human-readable reason when this factor dominates.
    pub fn reason(self) -> &'static str {
        match self {
            Factor::Time => "it is a good time to talk",
            Factor::Emotion => "feelings want to be shared",
            Factor::Relation => "wants attention from someone close",
            Factor::Context => "the conversation invites a reply",
            Factor::Curiosity => "curious about something",
            Factor::Urgency => "something needs saying now",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Factor {
    type Err = anima_core::AnimaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Factor::ALL
            .into_iter()
            .find(|f| f.label() == s)
            .ok_or_else(|| anima_core::AnimaError::invalid(format!("unknown factor '{s}'")))
    }
}

/// Relationship with whoever the companion would address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationTier {
    /// The bonded user
    Primary,
    Close,
    Friend,
    #[default]
    Acquaintance,
    Stranger,
}

impl RelationTier {
    pub fn threshold(self, thresholds: &TierThresholds) -> f32 {
        match self {
            RelationTier::Primary => thresholds.primary,
            RelationTier::Close => thresholds.close,
            RelationTier::Friend => thresholds.friend,
            RelationTier::Acquaintance => thresholds.acquaintance,
            RelationTier::Stranger => thresholds.stranger,
        }
    }

    /// Baseline closeness used by the relation signal.
    pub fn affinity(self) -> f32 {
        match self {
            RelationTier::Primary => 1.0,
            RelationTier::Close => 0.8,
            RelationTier::Friend => 0.6,
            RelationTier::Acquaintance => 0.4,
            RelationTier::Stranger => 0.2,
        }
    }
}

impl std::str::FromStr for RelationTier {
    type Err = anima_core::AnimaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "master" => Ok(RelationTier::Primary),
            "close" => Ok(RelationTier::Close),
            "friend" => Ok(RelationTier::Friend),
            "acquaintance" => Ok(RelationTier::Acquaintance),
            "stranger" => Ok(RelationTier::Stranger),
            other => Err(anima_core::AnimaError::invalid(format!(
                "unknown relation tier '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    pub tier: RelationTier,
    /// The companion was named or spoken to directly
    pub addressed: bool,
    /// Others are mid-conversation
    pub conversation_active: bool,
}

/// Pre-normalized factor inputs, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub time: f32,
    pub emotion: f32,
    pub relation: f32,
    pub context: f32,
    pub curiosity: f32,
    pub urgency: f32,
    pub situation: Situation,
}

impl Signals {
    pub fn uniform(value: f32, situation: Situation) -> Self {
        Self::from_array([value; 6], situation)
    }

    pub fn from_array(values: [f32; 6], situation: Situation) -> Self {
        Self {
            time: values[0],
            emotion: values[1],
            relation: values[2],
            context: values[3],
            curiosity: values[4],
            urgency: values[5],
            situation,
        }
    }

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

    pub fn get(&self, factor: Factor) -> f32 {
        self.as_array()[factor.index()]
    }

    pub fn set(&mut self, factor: Factor, value: f32) {
        match factor {
            Factor::Time => self.time = value,
            Factor::Emotion => self.emotion = value,
            Factor::Relation => self.relation = value,
            Factor::Context => self.context = value,
            Factor::Curiosity => self.curiosity = value,
            Factor::Urgency => self.urgency = value,
        }
    }

    /// NaN/Inf → 0, then clamp to [0, 1].
    pub fn sanitized(&self) -> Self {
        let values = self.as_array().map(|v| sanitize_f32(v, 0.0).clamp(0.0, 1.0));
        Self::from_array(values, self.situation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    /// Sanitized per-factor sub-scores
    pub factors: Signals,
    pub overall_score: f32,
    pub overall_confidence: f32,
    pub dominant: Factor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Immediate,
    WaitForGap,
    WaitForOpportunity,
    DontSpeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakDecision {
    pub should_speak: bool,
    pub timing: Timing,
    /// `Low` whenever `should_speak` is false
    pub priority: Priority,
    pub confidence: f32,
    /// Dominant factor
    pub reason: Factor,
    pub score: f32,
    pub threshold: f32,
}

impl SpeakDecision {
    pub fn explain(&self) -> &'static str {
        self.reason.reason()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecisionScorer {
    config: DecisionConfig,
}

impl DecisionScorer {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn threshold(&self, tier: RelationTier) -> f32 {
        tier.threshold(&self.config.thresholds)
    }

    pub fn score(&self, signals: &Signals) -> Scores {
        let factors = signals.sanitized();
        let values = factors.as_array();
        let weights = self.config.weights.as_array();

        let overall = values
            .iter()
            .zip(weights.iter())
            .map(|(v, w)| v * w)
            .sum::<f32>()
            .clamp(0.0, 1.0);

        Scores {
            factors,
            overall_score: overall,
            overall_confidence: agreement_confidence(&values),
            dominant: dominant_factor(&factors),
        }
    }

    pub fn decide(&self, scores: &Scores) -> SpeakDecision {
        let situation = scores.factors.situation;
        let threshold = self.threshold(situation.tier);
        let should_speak = scores.overall_score >= threshold;
        let urgent = scores.factors.urgency >= self.config.immediate_urgency;

        let timing = if !should_speak {
            Timing::DontSpeak
        } else if situation.addressed || urgent {
            Timing::Immediate
        } else if situation.conversation_active {
            Timing::WaitForGap
        } else {
            Timing::WaitForOpportunity
        };

        // Staying quiet is always low priority, however loud one factor is
        let priority = if !should_speak {
            Priority::Low
        } else if urgent {
            Priority::Urgent
        } else if scores.overall_score >= 0.7
            || scores.factors.emotion >= 0.7
            || scores.dominant == Factor::Urgency
        {
            Priority::High
        } else {
            Priority::Normal
        };

        SpeakDecision {
            should_speak,
            timing,
            priority,
            confidence: scores.overall_confidence,
            reason: scores.dominant,
            score: scores.overall_score,
            threshold,
        }
    }

    pub fn evaluate(&self, signals: &Signals) -> (Scores, SpeakDecision) {
        let scores = self.score(signals);
        let decision = self.decide(&scores);
        (scores, decision)
    }
}

/// `0.6·mean + 0.4·(1 - 2·stddev)`: high when inputs are strong and agree.
fn agreement_confidence(values: &[f32; 6]) -> f32 {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let consistency = 1.0 - 2.0 * variance.sqrt();
    (0.6 * mean + 0.4 * consistency).clamp(0.0, 1.0)
}

/// Highest value wins; ties go to the earlier factor in `Factor::PRIORITY`.
fn dominant_factor(signals: &Signals) -> Factor {
    let mut best = Factor::PRIORITY[0];
    let mut best_value = signals.get(best);
    for factor in Factor::PRIORITY.into_iter().skip(1) {
        let v = signals.get(factor);
        if v > best_value {
            best = factor;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> Situation {
        Situation {
            tier: RelationTier::Primary,
            ..Default::default()
        }
    }

    #[test]
    fn test_all_high_speaks_with_high_priority() {
        let scorer = DecisionScorer::default();
        let (scores, decision) = scorer.evaluate(&Signals::uniform(0.9, primary()));
        let expected: f32 = scorer.config().weights.as_array().iter().map(|w| w * 0.9).sum();
        assert!((scores.overall_score - expected).abs() < 1e-5);
        assert!(decision.should_speak);
        assert!(matches!(decision.priority, Priority::High | Priority::Urgent));
        assert!(decision.confidence > 0.9);
        // All equal: urgency wins the tie
        assert_eq!(decision.reason, Factor::Urgency);
    }

    #[test]
    fn test_threshold_depends_on_tier() {
        let scorer = DecisionScorer::default();
        let mut signals = Signals::uniform(0.6, primary());
        assert!(scorer.evaluate(&signals).1.should_speak);
        signals.situation.tier = RelationTier::Stranger;
        let (_, decision) = scorer.evaluate(&signals);
        assert!(!decision.should_speak);
        assert_eq!(decision.timing, Timing::DontSpeak);
        assert_eq!(decision.priority, Priority::Low);
        assert_eq!(decision.threshold, scorer.config().thresholds.stranger);
    }

    #[test]
    fn test_quiet_decision_is_low_priority_despite_urgency() {
        let scorer = DecisionScorer::default();
        let mut signals = Signals::uniform(0.1, primary());
        signals.situation.tier = RelationTier::Stranger;
        signals.urgency = 0.95;
        signals.emotion = 0.9;
        let (_, decision) = scorer.evaluate(&signals);
        assert!(!decision.should_speak);
        assert_eq!(decision.timing, Timing::DontSpeak);
        assert_eq!(decision.priority, Priority::Low);
        assert_eq!(decision.reason, Factor::Urgency);
    }

    #[test]
    fn test_timing_classification() {
        let scorer = DecisionScorer::default();
        let mut signals = Signals::uniform(0.6, primary());
        assert_eq!(scorer.evaluate(&signals).1.timing, Timing::WaitForOpportunity);

        signals.situation.conversation_active = true;
        assert_eq!(scorer.evaluate(&signals).1.timing, Timing::WaitForGap);

        signals.situation.addressed = true;
        assert_eq!(scorer.evaluate(&signals).1.timing, Timing::Immediate);

        signals.situation.addressed = false;
        signals.urgency = 0.95;
        let (_, decision) = scorer.evaluate(&signals);
        assert_eq!(decision.timing, Timing::Immediate);
        assert_eq!(decision.priority, Priority::Urgent);
    }

    #[test]
    fn test_dominant_factor() {
        let scorer = DecisionScorer::default();
        let mut signals = Signals::uniform(0.2, primary());
        signals.curiosity = 0.8;
        assert_eq!(scorer.score(&signals).dominant, Factor::Curiosity);
        signals.emotion = 0.8;
        assert_eq!(scorer.score(&signals).dominant, Factor::Emotion);
        signals.time = 0.99;
        assert_eq!(scorer.score(&signals).dominant, Factor::Time);
    }

    #[test]
    fn test_confidence_lower_when_signals_disagree() {
        let scorer = DecisionScorer::default();
        let agree = scorer.score(&Signals::uniform(0.5, primary()));
        let disagree = scorer.score(&Signals::from_array([0.0, 1.0, 0.0, 1.0, 0.0, 1.0], primary()));
        assert!(agree.overall_confidence > disagree.overall_confidence);
        let weak = scorer.score(&Signals::uniform(0.1, primary()));
        assert!(agree.overall_confidence > weak.overall_confidence);
    }

    #[test]
    fn test_garbage_inputs_are_sanitized() {
        let scorer = DecisionScorer::default();
        let signals = Signals::from_array([f32::NAN, 7.0, -3.0, f32::INFINITY, 0.5, 0.5], primary());
        let scores = scorer.score(&signals);
        assert_eq!(scores.factors.time, 0.0);
        assert_eq!(scores.factors.emotion, 1.0);
        assert_eq!(scores.factors.relation, 0.0);
        assert_eq!(scores.factors.context, 0.0);
        assert!((0.0..=1.0).contains(&scores.overall_score));
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        let (_, decision) = DecisionScorer::default().evaluate(&Signals::uniform(0.1, primary()));
        let json = serde_json::to_value(decision).unwrap();
        assert_eq!(json["timing"], "dont_speak");
        assert_eq!(json["priority"], "low");
        assert_eq!(json["reason"], "urgency");
    }

    #[test]
    fn test_parse_tier_and_factor() {
        assert_eq!("Primary".parse::<RelationTier>().unwrap(), RelationTier::Primary);
        assert_eq!("stranger".parse::<RelationTier>().unwrap(), RelationTier::Stranger);
        assert!("boss".parse::<RelationTier>().is_err());
        assert_eq!("urgency".parse::<Factor>().unwrap(), Factor::Urgency);
    }
}
