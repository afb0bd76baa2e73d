//! The single logical decision loop.
//!
//! Each tick: advance the emotion transition, collect signals, score, decide,
//! and publish the result on a watch channel. Perception feeds in through
//! [`DecisionLoop::observe_utterance`] concurrently with ticking.

use crate::decision::{DecisionScorer, Scores, Situation, SpeakDecision};
use crate::interaction::InteractionTracker;
use crate::signals::SignalCollector;
use anima_limbic::{BiologicalClock, EmotionEngine, HeartbeatConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// One published tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTick {
    pub sequence: u64,
    pub at: chrono::DateTime<chrono::Utc>,
    pub scores: Scores,
    pub decision: SpeakDecision,
}

pub struct DecisionLoop {
    scorer: DecisionScorer,
    collector: SignalCollector,
    emotion: Arc<EmotionEngine>,
    biology: Arc<BiologicalClock>,
    interactions: Arc<InteractionTracker>,
    clock: Arc<dyn anima_core::Clock>,
    situation: RwLock<Situation>,
    sequence: AtomicU64,
    decision_tx: watch::Sender<Option<DecisionTick>>,
}

impl DecisionLoop {
    pub fn new(
        scorer: DecisionScorer,
        collector: SignalCollector,
        emotion: Arc<EmotionEngine>,
        biology: Arc<BiologicalClock>,
        interactions: Arc<InteractionTracker>,
        clock: Arc<dyn anima_core::Clock>,
    ) -> Self {
        let (decision_tx, _) = watch::channel(None);
        Self {
            scorer,
            collector,
            emotion,
            biology,
            interactions,
            clock,
            situation: RwLock::new(Situation::default()),
            sequence: AtomicU64::new(0),
            decision_tx,
        }
    }

    /// Latest decision; `None` until the first tick.
    pub fn subscribe(&self) -> watch::Receiver<Option<DecisionTick>> {
        self.decision_tx.subscribe()
    }

    pub fn latest(&self) -> Option<DecisionTick> {
        self.decision_tx.borrow().clone()
    }

    pub async fn set_situation(&self, situation: Situation) {
        *self.situation.write().await = situation;
    }

    pub async fn situation(&self) -> Situation {
        *self.situation.read().await
    }

    /// An utterance was heard (or spoken).
    ///
    /// `intensity` is the conversational load of the turn, fed to fatigue.
    pub async fn observe_utterance(&self, is_primary: bool, intensity: f32) {
        tokio::join!(
            self.interactions.record(is_primary),
            self.biology.record_conversation(intensity),
        );
    }

    /// Run one decision cycle and publish it.
    pub async fn tick_once(&self) -> DecisionTick {
        self.emotion.tick().await;
        let situation = self.situation().await;
        let signals = self.collector.collect(situation).await;
        let (scores, decision) = self.scorer.evaluate(&signals);

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if decision.should_speak {
            tracing::info!(
                "Speak decision #{}: {:?}/{:?} because {} (score={:.2} >= {:.2})",
                sequence,
                decision.timing,
                decision.priority,
                decision.explain(),
                decision.score,
                decision.threshold
            );
        } else {
            tracing::debug!(
                "Decision #{}: stay quiet (score={:.2} < {:.2})",
                sequence,
                decision.score,
                decision.threshold
            );
        }

        let tick = DecisionTick {
            sequence,
            at: self.clock.now(),
            scores,
            decision,
        };
        self.decision_tx.send_replace(Some(tick.clone()));
        tick
    }

    /// Spawn the heartbeat. Stops when `shutdown` flips to true or its sender drops.
    pub fn spawn(
        self: Arc<Self>,
        heartbeat: HeartbeatConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Decision loop stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::RelationTier;
    use crate::signals::{EmotionSignal, RelationSignal, SharedSignal, TimeSignal};
    use crate::Factor;
    use anima_core::config::{AnimaConfig, BiologyConfig};
    use anima_core::{Clock, EmotionalState, ManualClock};
    use anima_limbic::EmotionModel;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    struct Rig {
        clock: Arc<ManualClock>,
        emotion: Arc<EmotionEngine>,
        urgency: SharedSignal,
        looper: Arc<DecisionLoop>,
    }

    fn rig() -> Rig {
        let config = AnimaConfig::default();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let emotion = Arc::new(EmotionEngine::new(EmotionModel::default(), dyn_clock.clone()));
        let biology = Arc::new(BiologicalClock::new(
            BiologyConfig {
                utc_offset_minutes: Some(0),
                ..Default::default()
            },
            dyn_clock.clone(),
        ));
        let interactions = Arc::new(InteractionTracker::new(config.interaction.clone(), dyn_clock.clone()));
        let urgency = SharedSignal::new(Factor::Urgency);
        let collector = SignalCollector::new(config.decision.fallback)
            .with_provider(Arc::new(EmotionSignal::new(emotion.clone())))
            .with_provider(Arc::new(TimeSignal::new(biology.clone())))
            .with_provider(Arc::new(RelationSignal::new(interactions.clone())))
            .with_provider(Arc::new(urgency.clone()));
        let looper = Arc::new(DecisionLoop::new(
            DecisionScorer::new(config.decision.clone()),
            collector,
            emotion.clone(),
            biology,
            interactions,
            dyn_clock,
        ));
        Rig {
            clock,
            emotion,
            urgency,
            looper,
        }
    }

    #[tokio::test]
    async fn test_tick_publishes_decision() {
        let rig = rig();
        let mut rx = rig.looper.subscribe();
        assert!(rx.borrow().is_none());

        let tick = rig.looper.tick_once().await;
        assert_eq!(tick.sequence, 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&tick));
        assert_eq!(rig.looper.latest().map(|t| t.sequence), Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_ticks_get_distinct_sequences() {
        let rig = rig();
        let ticks = futures::future::join_all((0..8).map(|_| rig.looper.tick_once())).await;
        let mut seqs: Vec<u64> = ticks.iter().map(|t| t.sequence).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());
        assert!(rig.looper.latest().is_some());
    }

    #[tokio::test]
    async fn test_urgent_push_speaks_immediately() {
        let rig = rig();
        rig.looper
            .set_situation(Situation {
                tier: RelationTier::Primary,
                addressed: false,
                conversation_active: false,
            })
            .await;
        rig.emotion.request(EmotionalState::Excited, 0.9).await;
        rig.clock.advance(chrono::Duration::minutes(5));
        rig.urgency.set(1.0);

        let tick = rig.looper.tick_once().await;
        assert!(tick.decision.should_speak, "{:?}", tick);
        assert_eq!(tick.decision.timing, crate::Timing::Immediate);
        assert_eq!(tick.decision.priority, crate::Priority::Urgent);
    }

    #[tokio::test]
    async fn test_quiet_with_stranger() {
        let rig = rig();
        rig.looper
            .set_situation(Situation {
                tier: RelationTier::Stranger,
                ..Default::default()
            })
            .await;
        let tick = rig.looper.tick_once().await;
        assert!(!tick.decision.should_speak);
    }

    #[tokio::test]
    async fn test_observe_utterance_feeds_fatigue_and_history() {
        let rig = rig();
        rig.looper.observe_utterance(false, 0.3).await;
        rig.looper.observe_utterance(true, 0.3).await;
        assert_eq!(rig.looper.interactions.len().await, 2);
        let fatigue = rig.looper.biology.fatigue_record().await.unwrap();
        assert_eq!(fatigue.conversation_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_ticks_and_stops() {
        let rig = rig();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut rx = rig.looper.subscribe();
        let handle = rig.looper.clone().spawn(HeartbeatConfig::testing(), stop_rx);

        rx.changed().await.unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(rig.looper.latest().map(|t| t.sequence).unwrap_or(0) >= 2);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
