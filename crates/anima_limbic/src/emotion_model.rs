//! Transition costs between discrete emotional states.
//!
//! Costs are durations in seconds and are deliberately asymmetric:
//!
//! | from → to                  | cost                                   |
//! |----------------------------|----------------------------------------|
//! | same state                 | 0                                      |
//! | same similarity group      | `similar_secs`                         |
//! | anything → Calm            | fast..slow, by how negative the source |
//! | Calm → anything            | `activation_secs`                      |
//! | positive ↔ negative        | `cross_valence_secs`                   |
//! | everything else            | `default_secs`                         |
//!
//! Rules are checked top to bottom; the first match wins.

use anima_core::config::EmotionConfig;
use anima_core::{sanitize_f32, EmotionalState};

/// States that blend into each other quickly regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityGroup {
    Joyful,
    Gloomy,
    Resentful,
    Uneasy,
}

impl SimilarityGroup {
    pub fn of(state: EmotionalState) -> Option<Self> {
        use EmotionalState::*;
        match state {
            Happy | Excited | Touched => Some(Self::Joyful),
            Sad | Disappointed | Lonely | Neglected => Some(Self::Gloomy),
            Angry | Jealous => Some(Self::Resentful),
            Worried | Shy => Some(Self::Uneasy),
            Calm | Curious | Tired => None,
        }
    }
}

/// How deep a state sits below calm (0.0 = no recovery needed, 1.0 = slowest).
fn recovery_depth(state: EmotionalState) -> f32 {
    use EmotionalState::*;
    match state {
        Calm => 0.0,
        Happy | Excited | Curious | Touched => 0.0,
        Shy => 0.1,
        Tired => 0.2,
        Worried => 0.35,
        Jealous | Disappointed => 0.5,
        Neglected => 0.65,
        Lonely => 0.7,
        Sad | Angry => 1.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmotionModel {
    config: EmotionConfig,
}

impl EmotionModel {
    pub fn new(config: EmotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmotionConfig {
        &self.config
    }

    pub fn is_positive(&self, state: EmotionalState) -> bool {
        state.is_positive()
    }

    pub fn is_negative(&self, state: EmotionalState) -> bool {
        state.is_negative()
    }

    /// Base transition cost in seconds.
    pub fn transition_cost(&self, from: EmotionalState, to: EmotionalState) -> f32 {
        let c = &self.config;
        if from == to {
            return 0.0;
        }

        if let (Some(a), Some(b)) = (SimilarityGroup::of(from), SimilarityGroup::of(to)) {
            if a == b {
                return c.similar_secs;
            }
        }

        if to == EmotionalState::Calm {
            let depth = recovery_depth(from);
            return c.recovery_fast_secs + depth * (c.recovery_slow_secs - c.recovery_fast_secs);
        }

        if from == EmotionalState::Calm {
            return c.activation_secs;
        }

        if (from.is_positive() && to.is_negative()) || (from.is_negative() && to.is_positive()) {
            return c.cross_valence_secs;
        }

        c.default_secs
    }

    /// Scale a base cost by `1 + (intensity - 0.5)`, floored at `min_secs`.
    ///
    /// Intense emotions are stubborn: they take longer to leave.
    pub fn adjust_by_intensity(&self, base_cost: f32, intensity: f32) -> f32 {
        let intensity = sanitize_f32(intensity, 0.5).clamp(0.0, 1.0);
        let base_cost = sanitize_f32(base_cost, 0.0).max(0.0);
        (base_cost * (1.0 + (intensity - 0.5))).max(self.config.min_secs)
    }

    /// Adjusted duration of a transition; zero for a same-state request.
    pub fn transition_duration(
        &self,
        from: EmotionalState,
        to: EmotionalState,
        intensity: f32,
    ) -> chrono::Duration {
        if from == to {
            return chrono::Duration::zero();
        }
        let secs = self.adjust_by_intensity(self.transition_cost(from, to), intensity);
        chrono::Duration::milliseconds((secs as f64 * 1000.0).round() as i64)
    }
}
