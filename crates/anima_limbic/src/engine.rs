//! The shared emotion engine.
//!
//! Owns the resting emotion and the in-flight transition. One writer at a
//! time (the decision loop or a perception handler); any number of readers.

use crate::emotion_model::EmotionModel;
use crate::transition::EmotionTransition;
use anima_core::{sanitize_f32, Clock, EmotionalState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct EmotionSlot {
    resting: EmotionalState,
    resting_intensity: f32,
    transition: Option<EmotionTransition>,
}

/// Point-in-time view of the emotional state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSnapshot {
    /// What the companion currently shows
    pub visible: EmotionalState,
    pub resting: EmotionalState,
    pub target: Option<EmotionalState>,
    pub progress: f32,
    pub intensity: f32,
}

impl EmotionSnapshot {
    /// Emotion factor for the speak decision (0.0 - 1.0).
    pub fn emotion_signal(&self) -> f32 {
        (self.visible.speech_drive() * (0.5 + 0.5 * self.intensity)).clamp(0.0, 1.0)
    }

    pub fn in_transition(&self) -> bool {
        self.target.is_some()
    }
}

pub struct EmotionEngine {
    model: EmotionModel,
    clock: Arc<dyn Clock>,
    state: RwLock<EmotionSlot>,
}

impl EmotionEngine {
    pub fn new(model: EmotionModel, clock: Arc<dyn Clock>) -> Self {
        Self::with_initial(model, clock, EmotionalState::Calm, 0.3)
    }

    pub fn with_initial(
        model: EmotionModel,
        clock: Arc<dyn Clock>,
        initial: EmotionalState,
        intensity: f32,
    ) -> Self {
        Self {
            model,
            clock,
            state: RwLock::new(EmotionSlot {
                resting: initial,
                resting_intensity: sanitize_f32(intensity, 0.3).clamp(0.0, 1.0),
                transition: None,
            }),
        }
    }

    pub fn model(&self) -> &EmotionModel {
        &self.model
    }

    /// Request a move toward `target`.
    ///
    /// The transition starts from whatever is visible right now, so a request
    /// arriving mid-transition re-plans from the shown emotion. Repeating the
    /// request for the target already in flight keeps its schedule and only
    /// updates the intensity. Returns `None` when the target is already showing
    /// at rest.
    pub async fn request(
        &self,
        target: EmotionalState,
        intensity: f32,
    ) -> Option<EmotionTransition> {
        let now = self.clock.now();
        let intensity = sanitize_f32(intensity, 0.5).clamp(0.0, 1.0);
        let mut slot = self.state.write().await;
        Self::settle(&mut slot, now);

        if let Some(t) = slot.transition.as_mut().filter(|t| t.target_emotion == target) {
            t.intensity = intensity;
            return Some(t.clone());
        }

        let from = Self::visible(&slot);
        if from == target {
            slot.transition = None;
            slot.resting = target;
            slot.resting_intensity = intensity;
            return None;
        }

        let duration = self.model.transition_duration(from, target, intensity);
        let transition = EmotionTransition::new(from, target, intensity, now, duration);
        tracing::debug!(
            "Emotion transition {} -> {} over {}s (intensity={:.2})",
            from,
            target,
            duration.num_seconds(),
            intensity
        );

        slot.resting = from;
        slot.transition = Some(transition.clone());
        Some(transition)
    }

    /// Advance the in-flight transition; promote the target once complete.
    pub async fn tick(&self) -> EmotionSnapshot {
        let now = self.clock.now();
        let mut slot = self.state.write().await;
        Self::settle(&mut slot, now);
        Self::snapshot_of(&slot)
    }

    /// Read-only view at the current time.
    pub async fn snapshot(&self) -> EmotionSnapshot {
        let now = self.clock.now();
        let mut slot = self.state.read().await.clone();
        Self::settle(&mut slot, now);
        Self::snapshot_of(&slot)
    }

    pub async fn current_transition(&self) -> Option<EmotionTransition> {
        self.state.read().await.transition.clone()
    }

    /// Drop any transition and rest in `state`.
    pub async fn reset(&self, state: EmotionalState) {
        let mut slot = self.state.write().await;
        slot.resting = state;
        slot.resting_intensity = 0.3;
        slot.transition = None;
    }

    fn settle(slot: &mut EmotionSlot, now: chrono::DateTime<chrono::Utc>) {
        let completed = match slot.transition.as_mut() {
            Some(t) => {
                t.update(now);
                t.is_complete()
            }
            None => false,
        };
        if completed {
            if let Some(t) = slot.transition.take() {
                tracing::debug!("Emotion settled on {}", t.target_emotion);
                slot.resting = t.target_emotion;
                slot.resting_intensity = t.intensity;
            }
        }
    }

    fn visible(slot: &EmotionSlot) -> EmotionalState {
        slot.transition
            .as_ref()
            .map(|t| t.visible_emotion())
            .unwrap_or(slot.resting)
    }

    fn snapshot_of(slot: &EmotionSlot) -> EmotionSnapshot {
        match &slot.transition {
            Some(t) => {
                let visible = t.visible_emotion();
                let intensity = if visible == t.target_emotion {
                    t.intensity
                } else {
                    slot.resting_intensity
                };
                EmotionSnapshot {
                    visible,
                    resting: slot.resting,
                    target: Some(t.target_emotion),
                    progress: t.progress,
                    intensity,
                }
            }
            None => EmotionSnapshot {
                visible: slot.resting,
                resting: slot.resting,
                target: None,
                progress: 1.0,
                intensity: slot.resting_intensity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Arc<ManualClock>, EmotionEngine) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        ));
        let engine = EmotionEngine::new(EmotionModel::default(), clock.clone());
        (clock, engine)
    }

    #[tokio::test]
    async fn test_request_then_complete() {
        let (clock, engine) = setup();
        // Calm -> Excited: activation 45s at intensity 0.5
        let t = engine.request(EmotionalState::Excited, 0.5).await.unwrap();
        assert_eq!(t.current_emotion, EmotionalState::Calm);
        assert_eq!((t.estimated_end_time - t.start_time).num_seconds(), 45);

        clock.advance(Duration::seconds(20));
        let snap = engine.tick().await;
        assert_eq!(snap.visible, EmotionalState::Calm);
        assert_eq!(snap.target, Some(EmotionalState::Excited));

        clock.advance(Duration::seconds(5));
        assert_eq!(engine.tick().await.visible, EmotionalState::Excited);

        clock.advance(Duration::seconds(30));
        let snap = engine.tick().await;
        assert_eq!(snap.resting, EmotionalState::Excited);
        assert!(snap.target.is_none());
        assert!(engine.current_transition().await.is_none());
    }

    #[tokio::test]
    async fn test_same_target_is_noop() {
        let (_clock, engine) = setup();
        assert!(engine.request(EmotionalState::Calm, 0.9).await.is_none());
        let snap = engine.snapshot().await;
        assert_eq!(snap.visible, EmotionalState::Calm);
        assert!((snap.intensity - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_replan_from_visible_emotion() {
        let (clock, engine) = setup();
        engine.request(EmotionalState::Sad, 0.5).await;
        // Past the halfway point Sad is visible
        clock.advance(Duration::seconds(30));
        let t = engine.request(EmotionalState::Happy, 0.5).await.unwrap();
        assert_eq!(t.current_emotion, EmotionalState::Sad);
        assert_eq!(
            (t.estimated_end_time - t.start_time).num_seconds(),
            EmotionModel::default().config().cross_valence_secs as i64
        );
    }

    #[tokio::test]
    async fn test_repeated_request_keeps_schedule() {
        let (clock, engine) = setup();
        let first = engine.request(EmotionalState::Sad, 0.5).await.unwrap();
        // Calm -> Sad takes 45s; asking again every 20s must not restart it
        for _ in 0..30 {
            clock.advance(Duration::seconds(20));
            if let Some(t) = engine.request(EmotionalState::Sad, 0.5).await {
                assert_eq!(t.start_time, first.start_time);
                assert_eq!(t.estimated_end_time, first.estimated_end_time);
            }
        }
        let snap = engine.tick().await;
        assert_eq!(snap.visible, EmotionalState::Sad);
        assert_eq!(snap.resting, EmotionalState::Sad);
        assert!(snap.target.is_none());
    }

    #[tokio::test]
    async fn test_repeated_request_updates_intensity_only() {
        let (clock, engine) = setup();
        let first = engine.request(EmotionalState::Happy, 0.5).await.unwrap();
        clock.advance(Duration::seconds(10));
        let again = engine.request(EmotionalState::Happy, 0.9).await.unwrap();
        assert_eq!(again.start_time, first.start_time);
        assert_eq!(again.estimated_end_time, first.estimated_end_time);
        assert!((again.intensity - 0.9).abs() < 1e-6);
        assert_eq!(engine.current_transition().await, Some(again));
    }

    #[tokio::test]
    async fn test_snapshot_does_not_mutate() {
        let (clock, engine) = setup();
        engine.request(EmotionalState::Curious, 0.5).await;
        clock.advance(Duration::hours(1));
        let snap = engine.snapshot().await;
        assert_eq!(snap.visible, EmotionalState::Curious);
        // Stored transition is only promoted by tick()
        assert!(engine.current_transition().await.is_some());
        engine.tick().await;
        assert!(engine.current_transition().await.is_none());
    }

    #[tokio::test]
    async fn test_emotion_signal_tracks_drive_and_intensity() {
        let (_clock, engine) = setup();
        engine.reset(EmotionalState::Lonely).await;
        let lonely = engine.snapshot().await.emotion_signal();
        engine.reset(EmotionalState::Tired).await;
        let tired = engine.snapshot().await.emotion_signal();
        assert!(lonely > tired);
        assert!((0.0..=1.0).contains(&lonely));
    }
}
