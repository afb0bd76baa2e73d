//! anima_bench: trajectory simulation tests for the companion's dynamics.
//!
//! Validates behavior over long simulated spans on a manual clock:
//! - A month of memories, some recalled regularly and some neglected
//! - Emotional memories outlasting neutral ones
//! - A morning of conversation wearing energy down, then recovering
//! - Being left out of a conversation pushing the companion to speak up

use anima_core::{Clock, ManualClock};
use chrono::Duration;
use std::sync::Arc;

/// Step `clock` forward `steps` times by `step`, awaiting `on_step` after each move.
pub async fn simulate<F, Fut>(clock: &ManualClock, step: Duration, steps: usize, mut on_step: F)
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    for i in 1..=steps {
        clock.advance(step);
        on_step(i).await;
    }
}

/// A manual clock erased to the trait object every engine takes.
pub fn shared(clock: &Arc<ManualClock>) -> Arc<dyn Clock> {
    clock.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::config::{AnimaConfig, BiologyConfig, MemoryConfig};
    use anima_core::{EmotionalState, InMemoryRepository, MemoryCategory, MemoryRecord};
    use anima_expression::{
        DecisionLoop, DecisionScorer, EmotionSignal, Factor, InteractionTracker, RelationSignal,
        RelationTier, SharedSignal, SignalCollector, Situation, TimeSignal, Timing,
    };
    use anima_limbic::{BiologicalClock, EmotionEngine, EmotionModel, TimeOfDay};
    use anima_memory::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn clock_at(hour: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()))
    }

    fn store(clock: &Arc<ManualClock>) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            Arc::new(InMemoryRepository::new()),
            shared(clock),
            MemoryConfig::default(),
        ))
    }

    /// 40 days, daily maintenance: a memory recalled every third day stays,
    /// a neglected one is forgotten within days and purged a month later.
    #[tokio::test]
    async fn test_recalled_vs_neglected_over_forty_days() {
        let clock = clock_at(9);
        let store = store(&clock);
        let now = clock.now();
        let kept = store
            .save(MemoryRecord::new("we adopted a cat named Miso", MemoryCategory::Episodic, now).with_importance(0.5))
            .await
            .unwrap();
        let neglected = store
            .save(MemoryRecord::new("the bus was late on Tuesday", MemoryCategory::Episodic, now).with_importance(0.5))
            .await
            .unwrap();

        let forgotten_on = Mutex::new(None);
        let (s, slot) = (&store, &forgotten_on);
        simulate(&clock, Duration::days(1), 40, move |day| {
            let store = s;
            async move {
                if day % 3 == 0 {
                    store.reinforce(kept).await.unwrap();
                }
                store.maintenance().await.unwrap();
                let n = store.get(neglected).await.unwrap();
                let mut slot = slot.lock().unwrap();
                if slot.is_none() && n.as_ref().is_some_and(|r| r.is_forgotten) {
                    *slot = Some(day);
                }
            }
        })
        .await;

        let day = forgotten_on.lock().unwrap().expect("neglected memory should be forgotten");
        assert!(day <= 7, "neglected memory lingered until day {day}");

        let kept = store.get(kept).await.unwrap().unwrap();
        assert!(kept.is_active());
        assert_eq!(kept.reinforcement_count, 13);
        assert!(store.strength(&kept, clock.now()) > 0.5);

        // Forgotten on day 4 or so, purged once 30 days have passed
        assert!(store.get(neglected).await.unwrap().is_none());
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 1);
    }

    /// Same importance, same neglect: the emotionally charged memory survives longer.
    #[tokio::test]
    async fn test_emotional_memory_outlasts_neutral() {
        let clock = clock_at(9);
        let store = store(&clock);
        let now = clock.now();

        let neutral = store
            .save(MemoryRecord::new("bought new socks", MemoryCategory::Episodic, now).with_importance(0.5))
            .await
            .unwrap();
        let mut charged = MemoryRecord::new("first time seeing the ocean together", MemoryCategory::Episodic, now)
            .with_importance(0.5);
        charged.emotion_tag = Some(EmotionalState::Touched);
        charged.emotion_intensity = 0.9;
        let charged = store.save(charged).await.unwrap();

        let days = Mutex::new((None, None));
        let (store_ref, days_ref) = (&store, &days);
        simulate(&clock, Duration::days(1), 30, move |day| {
            let (store, days) = (store_ref, days_ref);
            async move {
                store.perform_forgetting_cycle().await.unwrap();
                let n = store.get(neutral).await.unwrap().is_some_and(|r| r.is_forgotten);
                let c = store.get(charged).await.unwrap().is_some_and(|r| r.is_forgotten);
                let mut d = days.lock().unwrap();
                if n && d.0.is_none() {
                    d.0 = Some(day);
                }
                if c && d.1.is_none() {
                    d.1 = Some(day);
                }
            }
        })
        .await;

        let (neutral_day, charged_day) = *days.lock().unwrap();
        let neutral_day = neutral_day.expect("neutral memory forgotten");
        let charged_day = charged_day.expect("charged memory forgotten within a month");
        assert!(
            charged_day > neutral_day,
            "charged forgotten on day {charged_day}, neutral on day {neutral_day}"
        );
    }

    /// A chatty morning drains energy; an idle afternoon brings it back to baseline.
    #[tokio::test]
    async fn test_morning_of_conversation() {
        let clock = clock_at(9);
        let biology = BiologicalClock::new(
            BiologyConfig {
                utc_offset_minutes: Some(0),
                ..Default::default()
            },
            shared(&clock),
        );

        let fresh = biology.current_state().await;
        assert_eq!(fresh.time_of_day, TimeOfDay::LateMorning);
        assert!(!fresh.needs_rest);

        // A turn every five minutes until noon
        biology.record_conversation(0.3).await;
        let bio = &biology;
        simulate(&clock, Duration::minutes(5), 35, move |_| bio.record_conversation(0.3)).await;

        let tired = biology.current_state().await;
        assert_eq!(tired.conversation_count, 36);
        assert!(tired.fatigue > 0.7, "fatigue {}", tired.fatigue);
        assert!(tired.needs_rest);
        assert!(tired.energy_level < tired.baseline_energy * 0.6);

        // Six idle hours
        clock.advance(Duration::hours(6));
        let rested = biology.current_state().await;
        assert_eq!(rested.time_of_day, TimeOfDay::Afternoon);
        assert!(biology.fatigue_record().await.is_none());
        assert_eq!(rested.energy_level, rested.baseline_energy);
        assert_eq!(biology.total_conversations().await, 36);
    }

    /// Others chat for a while without the primary user; once the companion
    /// feels lonely it decides to speak up at the next gap.
    #[tokio::test]
    async fn test_left_out_of_the_conversation() {
        let config = AnimaConfig::default();
        let clock = clock_at(19);
        let emotion = Arc::new(EmotionEngine::new(EmotionModel::default(), shared(&clock)));
        let biology = Arc::new(BiologicalClock::new(
            BiologyConfig {
                utc_offset_minutes: Some(0),
                ..Default::default()
            },
            shared(&clock),
        ));
        let interactions = Arc::new(InteractionTracker::new(config.interaction.clone(), shared(&clock)));
        let context = SharedSignal::new(Factor::Context);
        let collector = SignalCollector::new(config.decision.fallback)
            .with_provider(Arc::new(EmotionSignal::new(emotion.clone())))
            .with_provider(Arc::new(TimeSignal::new(biology.clone())))
            .with_provider(Arc::new(RelationSignal::new(interactions.clone())))
            .with_provider(Arc::new(context.clone()));
        let looper = DecisionLoop::new(
            DecisionScorer::new(config.decision.clone()),
            collector,
            emotion.clone(),
            biology,
            interactions,
            shared(&clock),
        );
        looper
            .set_situation(Situation {
                tier: RelationTier::Primary,
                addressed: false,
                conversation_active: true,
            })
            .await;

        let before = looper.tick_once().await;
        assert!(!before.decision.should_speak, "{:?}", before);

        emotion.request(EmotionalState::Lonely, 0.8).await;
        let lp = &looper;
        simulate(&clock, Duration::minutes(2), 20, move |_| lp.observe_utterance(false, 0.0)).await;
        context.set(0.4);

        let after = looper.tick_once().await;
        assert!(after.decision.should_speak, "{:?}", after);
        assert_eq!(after.decision.timing, Timing::WaitForGap);
        assert_eq!(after.decision.reason, Factor::Relation);
        assert!(after.sequence > before.sequence);
    }
}
