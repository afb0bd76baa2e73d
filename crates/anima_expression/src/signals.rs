//! Concurrent signal collection.
//!
//! Every provider is sampled at once; nothing orders them. A provider that
//! errors, times out or is missing contributes the configured fallback for its
//! factor instead of failing the decision.

use crate::decision::{Factor, Signals, Situation};
use crate::interaction::InteractionTracker;
use anima_core::config::FallbackSignals;
use anima_core::sanitize_f32;
use anima_limbic::{BiologicalClock, EmotionEngine};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[async_trait]
pub trait SignalProvider: Send + Sync {
    fn factor(&self) -> Factor;

    /// Current value in [0, 1].
    async fn sample(&self, situation: &Situation) -> Result<f32>;

    fn name(&self) -> &str {
        self.factor().label()
    }
}

pub struct SignalCollector {
    providers: Vec<Arc<dyn SignalProvider>>,
    fallback: FallbackSignals,
    timeout: Duration,
}

impl SignalCollector {
    pub fn new(fallback: FallbackSignals) -> Self {
        Self {
            providers: Vec::new(),
            fallback,
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn add_provider(&mut self, provider: Arc<dyn SignalProvider>) {
        self.providers.push(provider);
    }

    /// Sample all providers concurrently.
    ///
    /// Several providers for one factor are averaged over those that succeeded.
    pub async fn collect(&self, situation: Situation) -> Signals {
        let samples = futures::future::join_all(self.providers.iter().map(|p| {
            let p = Arc::clone(p);
            async move {
                let value = match tokio::time::timeout(self.timeout, p.sample(&situation)).await {
                    Ok(Ok(v)) if v.is_finite() => Some(v.clamp(0.0, 1.0)),
                    Ok(Ok(v)) => {
                        tracing::warn!("Signal '{}' returned {}, using fallback", p.name(), v);
                        None
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Signal '{}' failed: {}, using fallback", p.name(), e);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("Signal '{}' timed out, using fallback", p.name());
                        None
                    }
                };
                (p.factor(), value)
            }
        }))
        .await;

        let mut signals = Signals::from_array(self.fallback.as_array(), situation);
        for factor in Factor::ALL {
            let values: Vec<f32> = samples
                .iter()
                .filter(|(f, _)| *f == factor)
                .filter_map(|(_, v)| *v)
                .collect();
            if !values.is_empty() {
                signals.set(factor, values.iter().sum::<f32>() / values.len() as f32);
            }
        }
        tracing::trace!("Collected signals: {:?}", signals.as_array());
        signals
    }
}

// ============================================================================
// Built-in providers
// ============================================================================

pub struct EmotionSignal {
    engine: Arc<EmotionEngine>,
}

impl EmotionSignal {
    pub fn new(engine: Arc<EmotionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SignalProvider for EmotionSignal {
    fn factor(&self) -> Factor {
        Factor::Emotion
    }

    async fn sample(&self, _situation: &Situation) -> Result<f32> {
        Ok(self.engine.snapshot().await.emotion_signal())
    }
}

pub struct TimeSignal {
    clock: Arc<BiologicalClock>,
}

impl TimeSignal {
    pub fn new(clock: Arc<BiologicalClock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl SignalProvider for TimeSignal {
    fn factor(&self) -> Factor {
        Factor::Time
    }

    async fn sample(&self, _situation: &Situation) -> Result<f32> {
        Ok(self.clock.current_state().await.time_signal())
    }
}

/// Tier affinity blended with how left out the companion has been recently.
pub struct RelationSignal {
    tracker: Arc<InteractionTracker>,
}

impl RelationSignal {
    pub fn new(tracker: Arc<InteractionTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl SignalProvider for RelationSignal {
    fn factor(&self) -> Factor {
        Factor::Relation
    }

    async fn sample(&self, situation: &Situation) -> Result<f32> {
        let left_out = self.tracker.relation_signal().await;
        Ok(0.5 * situation.tier.affinity() + 0.5 * left_out)
    }
}

/// A value pushed from outside (perception, dialogue state).
///
/// Unset means "no opinion": the collector then uses the fallback.
#[derive(Clone)]
pub struct SharedSignal {
    factor: Factor,
    value: Arc<RwLock<Option<f32>>>,
}

impl SharedSignal {
    pub fn new(factor: Factor) -> Self {
        Self {
            factor,
            value: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set(&self, value: f32) {
        let value = sanitize_f32(value, 0.0).clamp(0.0, 1.0);
        *self.value.write().unwrap_or_else(|e| e.into_inner()) = Some(value);
    }

    pub fn clear(&self) {
        *self.value.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn get(&self) -> Option<f32> {
        *self.value.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SignalProvider for SharedSignal {
    fn factor(&self) -> Factor {
        self.factor
    }

    async fn sample(&self, _situation: &Situation) -> Result<f32> {
        self.get()
            .ok_or_else(|| anyhow::anyhow!("no {} value pushed yet", self.factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Factor, f32);

    #[async_trait]
    impl SignalProvider for Fixed {
        fn factor(&self) -> Factor {
            self.0
        }
        async fn sample(&self, _situation: &Situation) -> Result<f32> {
            Ok(self.1)
        }
    }

    struct Failing(Factor);

    #[async_trait]
    impl SignalProvider for Failing {
        fn factor(&self) -> Factor {
            self.0
        }
        async fn sample(&self, _situation: &Situation) -> Result<f32> {
            anyhow::bail!("identity service down")
        }
    }

    struct Slow;

    #[async_trait]
    impl SignalProvider for Slow {
        fn factor(&self) -> Factor {
            Factor::Context
        }
        async fn sample(&self, _situation: &Situation) -> Result<f32> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1.0)
        }
    }

    #[tokio::test]
    async fn test_missing_and_failing_use_fallback() {
        let fallback = FallbackSignals::default();
        let collector = SignalCollector::new(fallback)
            .with_provider(Arc::new(Fixed(Factor::Emotion, 0.9)))
            .with_provider(Arc::new(Failing(Factor::Relation)));
        let s = collector.collect(Situation::default()).await;
        assert_eq!(s.emotion, 0.9);
        assert_eq!(s.relation, fallback.relation);
        assert_eq!(s.time, fallback.time);
        assert_eq!(s.urgency, fallback.urgency);
    }

    #[tokio::test]
    async fn test_duplicate_providers_average_and_clamp() {
        let collector = SignalCollector::new(FallbackSignals::default())
            .with_provider(Arc::new(Fixed(Factor::Curiosity, 0.2)))
            .with_provider(Arc::new(Fixed(Factor::Curiosity, 5.0)))
            .with_provider(Arc::new(Failing(Factor::Curiosity)));
        let s = collector.collect(Situation::default()).await;
        assert!((s.curiosity - 0.6).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let fallback = FallbackSignals::default();
        let collector = SignalCollector::new(fallback)
            .with_provider(Arc::new(Slow))
            .with_timeout(Duration::from_millis(50));
        let s = collector.collect(Situation::default()).await;
        assert_eq!(s.context, fallback.context);
    }

    #[tokio::test]
    async fn test_shared_signal() {
        let urgency = SharedSignal::new(Factor::Urgency);
        let collector =
            SignalCollector::new(FallbackSignals::default()).with_provider(Arc::new(urgency.clone()));
        assert_eq!(collector.collect(Situation::default()).await.urgency, 0.0);
        urgency.set(0.85);
        assert_eq!(collector.collect(Situation::default()).await.urgency, 0.85);
        urgency.clear();
        assert!(urgency.get().is_none());
    }
}
