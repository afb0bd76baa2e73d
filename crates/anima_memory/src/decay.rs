//! Ebbinghaus-style decay.
//!
//! Strength is never stored. It is recomputed from the record's counters and
//! timestamps every time somebody asks, so reinforcement can only ever move it
//! through the inputs.
//!
//! ```text
//! effective = ln(1 + reinforcements)·k1 + emotion·k2 + importance·k3
//!           + context·k4 - difficulty·k5            (floored at min)
//! R         = e^(-days_since_access / effective)
//! strength  = clamp(R · (c0 + c1·confidence), 0, 1)
//! ```

use anima_core::config::MemoryConfig;
use anima_core::{days_between, MemoryRecord};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct DecayModel {
    config: MemoryConfig,
}

impl DecayModel {
    pub fn new(config: MemoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Effective strength in days, before the exponential.
    pub fn effective_strength(&self, record: &MemoryRecord) -> f32 {
        let c = &self.config;
        let base = (1.0 + record.reinforcement_count as f32).ln() * c.reinforcement_weight;
        let emotion = record.emotional_weight() * c.emotion_weight;
        let importance = record.importance * c.importance_weight;
        let context = record.context_relevance * c.context_weight;
        let difficulty = record.recall_difficulty * c.difficulty_penalty;
        (base + emotion + importance + context - difficulty).max(c.min_effective_strength)
    }

    /// Retention-based strength in [0, 1].
    pub fn strength(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f32 {
        let days = days_between(record.last_accessed_at, now);
        let effective = self.effective_strength(record) as f64;
        let retention = (-days / effective).exp() as f32;
        let scale = self.config.confidence_base + self.config.confidence_weight * record.confidence;
        let strength = retention * scale;
        if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Important memories get a lower bar.
    pub fn forget_threshold(&self, importance: f32) -> f32 {
        self.config.forget_threshold - importance * self.config.importance_threshold_bonus
    }

    pub fn should_forget(&self, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        self.strength(record, now) < self.forget_threshold(record.importance)
    }

    /// Composite value used by the low-quality sweep.
    pub fn value_score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f32 {
        0.4 * self.strength(record, now) + 0.4 * record.importance + 0.2 * record.confidence
    }

    /// Low importance and not reinforced for the idle window.
    pub fn is_low_quality_candidate(&self, record: &MemoryRecord, now: DateTime<Utc>) -> bool {
        record.importance < self.config.low_quality_importance
            && days_between(record.last_accessed_at, now) >= self.config.low_quality_idle_days as f64
    }

    pub fn recall_difficulty(&self, content: &str) -> f32 {
        estimate_recall_difficulty(
            content,
            self.config.difficulty_length_chars,
            self.config.difficulty_long_token_chars,
        )
    }
}

/// Recall difficulty from content shape.
///
/// `0.4·length + 0.3·digit density + 0.3·long-token ratio`, each term in [0, 1].
/// Digit density saturates at one digit in three characters.
pub fn estimate_recall_difficulty(content: &str, length_chars: usize, long_token_chars: usize) -> f32 {
    let chars: Vec<char> = content.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return 0.0;
    }

    let length = (chars.len() as f32 / length_chars.max(1) as f32).min(1.0);
    let digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
    let digit_density = (digits as f32 / chars.len() as f32 * 3.0).min(1.0);

    let tokens: Vec<&str> = content.split_whitespace().collect();
    let long_tokens = tokens
        .iter()
        .filter(|t| t.chars().count() > long_token_chars)
        .count();
    let long_ratio = long_tokens as f32 / tokens.len().max(1) as f32;

    (0.4 * length + 0.3 * digit_density + 0.3 * long_ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::{EmotionalState, MemoryCategory};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_strong_recent_important_memory_survives() {
        let model = DecayModel::default();
        let mut r = MemoryRecord::new("our first trip to the sea", MemoryCategory::Episodic, now() - Duration::days(30))
            .with_importance(0.9);
        r.reinforcement_count = 5;
        r.last_accessed_at = now() - Duration::days(1);
        let s = model.strength(&r, now());
        assert!(s > 0.5, "strength was {s}");
        assert!(!model.should_forget(&r, now()));
    }

    #[test]
    fn test_weak_stale_memory_is_forgotten() {
        let model = DecayModel::default();
        let r = MemoryRecord::new("ok", MemoryCategory::Episodic, now() - Duration::days(90))
            .with_importance(0.1);
        let s = model.strength(&r, now());
        assert!(s < 0.15, "strength was {s}");
        assert!(model.should_forget(&r, now()));
    }

    #[test]
    fn test_strength_decays_over_time() {
        let model = DecayModel::default();
        let r = MemoryRecord::new("tea with milk", MemoryCategory::Preference, now());
        let mut last = model.strength(&r, now());
        for d in 1..60 {
            let s = model.strength(&r, now() + Duration::days(d));
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn test_emotion_bonus_uses_stronger_signal() {
        let model = DecayModel::default();
        let plain = MemoryRecord::new("x", MemoryCategory::Episodic, now());
        let felt = plain.clone().with_emotion(EmotionalState::Sad, -0.8, 0.2);
        let diff = model.effective_strength(&felt) - model.effective_strength(&plain);
        assert!((diff - 0.8 * model.config().emotion_weight).abs() < 1e-5);
    }

    #[test]
    fn test_effective_strength_floor() {
        let model = DecayModel::default();
        let mut r = MemoryRecord::new("x", MemoryCategory::Episodic, now()).with_importance(0.0);
        r.context_relevance = 0.0;
        r.recall_difficulty = 1.0;
        assert_eq!(model.effective_strength(&r), model.config().min_effective_strength);
        assert!(model.strength(&r, now() + Duration::days(1)).is_finite());
    }

    #[test]
    fn test_threshold_lower_for_important() {
        let model = DecayModel::default();
        assert!(model.forget_threshold(0.9) < model.forget_threshold(0.1));
    }

    #[test]
    fn test_recall_difficulty_shape() {
        assert_eq!(estimate_recall_difficulty("", 200, 8), 0.0);
        let easy = estimate_recall_difficulty("I like cats", 200, 8);
        let digits = estimate_recall_difficulty("PIN 4821 9930 1177", 200, 8);
        let long_words = estimate_recall_difficulty("electroencephalography characterization", 200, 8);
        assert!(digits > easy);
        assert!(long_words > easy);
        let huge = "x".repeat(5000);
        assert!(estimate_recall_difficulty(&huge, 200, 8) <= 1.0);
    }
}
