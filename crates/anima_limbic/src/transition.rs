//! A single in-flight move from one emotional state to another.

use anima_core::{sanitize_f32, EmotionalState};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTransition {
    pub current_emotion: EmotionalState,
    pub target_emotion: EmotionalState,
    /// 0.0 - 1.0
    pub progress: f32,
    pub start_time: DateTime<Utc>,
    pub estimated_end_time: DateTime<Utc>,
    /// 0.0 - 1.0, intensity of the target emotion
    pub intensity: f32,
}

impl EmotionTransition {
    pub fn new(
        from: EmotionalState,
        to: EmotionalState,
        intensity: f32,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        let duration = duration.max(Duration::zero());
        let mut transition = Self {
            current_emotion: from,
            target_emotion: to,
            progress: 0.0,
            start_time: start,
            estimated_end_time: start + duration,
            intensity: sanitize_f32(intensity, 0.5).clamp(0.0, 1.0),
        };
        transition.update(start);
        transition
    }

    /// `clamp((now - start) / (end - start), 0, 1)`; a zero-length transition is complete.
    pub fn progress_at(&self, now: DateTime<Utc>) -> f32 {
        let total = (self.estimated_end_time - self.start_time).num_milliseconds();
        if total <= 0 {
            return 1.0;
        }
        let elapsed = (now - self.start_time).num_milliseconds();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0) as f32
    }

    /// Recompute progress for `now` and return it.
    pub fn update(&mut self, now: DateTime<Utc>) -> f32 {
        self.progress = self.progress_at(now);
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// The externally visible emotion.
    ///
    /// This is a binary switch at the halfway point, not a blend: the source
    /// emotion is reported up to and including 50% progress, the target after.
    pub fn visible_emotion(&self) -> EmotionalState {
        if self.progress > 0.5 {
            self.target_emotion
        } else {
            self.current_emotion
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.estimated_end_time - now).max(Duration::zero())
    }
}
