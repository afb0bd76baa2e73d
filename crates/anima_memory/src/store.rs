//! Memory store: ingestion, reinforcement and the forgetting lifecycle.
//!
//! Every mutation is a load → modify → persist cycle on a single record. Those
//! cycles are serialized by `mutation_lock`; readers go straight to the
//! repository and may see a slightly stale record, never a partial one.

use crate::decay::DecayModel;
use crate::evaluator::HeuristicEvaluator;
use anima_core::config::MemoryConfig;
use anima_core::{
    days_between, AnimaError, AnimaResult, Clock, Embedder, ImportanceEvaluator, MemoryCategory,
    MemoryId, MemoryRecord, MemoryRepository,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of one [`MemoryStore::maintenance`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Flagged by the decay-based forgetting cycle
    pub forgotten: usize,
    /// Flagged by the low-quality sweep
    pub low_quality: usize,
    /// Physically deleted after the retention window
    pub purged: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub total: usize,
    pub active: usize,
    pub forgotten: usize,
    /// Active records per category name
    pub by_category: BTreeMap<String, usize>,
    /// Mean strength over active records (0 when empty)
    pub average_strength: f32,
    /// Mean importance over active records (0 when empty)
    pub average_importance: f32,
    /// Active records whose strength is under twice their forget threshold
    pub at_risk: usize,
}

pub struct MemoryStore {
    repo: Arc<dyn MemoryRepository>,
    clock: Arc<dyn Clock>,
    decay: DecayModel,
    evaluator: Arc<dyn ImportanceEvaluator>,
    embedder: Option<Arc<dyn Embedder>>,
    /// Serializes read-modify-write cycles (reinforce, forget, sweeps).
    mutation_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    /// Store with the heuristic evaluator and no embedder.
    pub fn new(repo: Arc<dyn MemoryRepository>, clock: Arc<dyn Clock>, config: MemoryConfig) -> Self {
        Self {
            repo,
            clock,
            decay: DecayModel::new(config),
            evaluator: Arc::new(HeuristicEvaluator::new()),
            embedder: None,
            mutation_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ImportanceEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn decay(&self) -> &DecayModel {
        &self.decay
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate, clamp and persist a fully formed record.
    pub async fn save(&self, mut record: MemoryRecord) -> AnimaResult<MemoryId> {
        record.validate()?;
        record.normalize();
        let _guard = self.mutation_lock.lock().await;
        self.repo.persist(&record).await?;
        tracing::debug!("Saved memory {} ({})", record.id, record.category);
        Ok(record.id)
    }

    /// Create a record from raw content.
    ///
    /// Importance and confidence come from the evaluator, or from the heuristic
    /// when it fails. The embedding comes from the embedder if any; an embedding
    /// failure stores the record without one.
    pub async fn ingest(
        &self,
        content: &str,
        category: MemoryCategory,
        context: &str,
    ) -> AnimaResult<MemoryRecord> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AnimaError::invalid("memory content is empty"));
        }
        let now = self.clock.now();
        let mut record = MemoryRecord::new(content, category, now);

        match self.evaluator.evaluate(content, &record.category, context).await {
            Ok(eval) => {
                record.importance = eval.importance;
                record.confidence = eval.confidence;
            }
            Err(e) => {
                tracing::warn!(
                    "Evaluator '{}' failed ({}), using heuristic fallback",
                    self.evaluator.name(),
                    e
                );
                let eval = HeuristicEvaluator.score(content, &record.category);
                record.importance = eval.importance;
                record.confidence = eval.confidence;
            }
        }

        if let Some(embedder) = &self.embedder {
            match embedder.embed(content).await {
                Ok(v) if !v.is_empty() && v.iter().all(|x| x.is_finite()) => record.embedding = Some(v),
                Ok(_) => tracing::warn!("Embedder returned an unusable vector, storing without one"),
                Err(e) => tracing::warn!("Embedding failed ({}), storing without one", e),
            }
        }

        record.recall_difficulty = self.decay.recall_difficulty(content);
        record.normalize();
        {
            let _guard = self.mutation_lock.lock().await;
            self.repo.persist(&record).await?;
        }
        tracing::debug!(
            "Ingested memory {} (importance={:.2}, confidence={:.2})",
            record.id,
            record.importance,
            record.confidence
        );
        Ok(record)
    }

    pub async fn get(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>> {
        self.repo.load(id).await
    }

    pub async fn active(&self) -> AnimaResult<Vec<MemoryRecord>> {
        self.repo.query_active().await
    }

    pub async fn all(&self) -> AnimaResult<Vec<MemoryRecord>> {
        self.repo.query_all().await
    }

    /// Record an access: bump counters and reset the decay clock.
    pub async fn reinforce(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>> {
        let now = self.clock.now();
        self.update(id, |r| {
            r.reinforcement_count = r.reinforcement_count.saturating_add(1);
            r.access_count = r.access_count.saturating_add(1);
            r.last_accessed_at = now;
        })
        .await
    }

    /// Flag as forgotten. Returns `None` for an unknown id.
    pub async fn forget(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>> {
        let now = self.clock.now();
        self.update(id, |r| {
            if !r.is_forgotten {
                r.is_forgotten = true;
                r.forgotten_at = Some(now);
            }
        })
        .await
    }

    /// Back to active with a fresh decay clock.
    pub async fn restore(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>> {
        let now = self.clock.now();
        self.update(id, |r| {
            r.is_forgotten = false;
            r.forgotten_at = None;
            r.last_accessed_at = now;
        })
        .await
    }

    pub fn strength(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f32 {
        self.decay.strength(record, now)
    }

    /// Flag every active record whose strength fell under its threshold.
    pub async fn perform_forgetting_cycle(&self) -> AnimaResult<usize> {
        let _guard = self.mutation_lock.lock().await;
        let now = self.clock.now();
        let mut count = 0;
        for mut record in self.repo.query_active().await? {
            if self.decay.should_forget(&record, now) {
                tracing::trace!(
                    "Forgetting {} (strength={:.3})",
                    record.id,
                    self.decay.strength(&record, now)
                );
                record.is_forgotten = true;
                record.forgotten_at = Some(now);
                self.repo.persist(&record).await?;
                count += 1;
            }
        }
        if count > 0 {
            tracing::info!("Forgetting cycle flagged {} memories", count);
        }
        Ok(count)
    }

    /// Delete records forgotten for longer than the retention window.
    pub async fn purge_expired(&self) -> AnimaResult<usize> {
        let _guard = self.mutation_lock.lock().await;
        let now = self.clock.now();
        let retention = self.decay.config().retention_days as f64;
        let mut count = 0;
        for record in self.repo.query_all().await? {
            let Some(forgotten_at) = record.forgotten_at.filter(|_| record.is_forgotten) else {
                continue;
            };
            if days_between(forgotten_at, now) > retention && self.repo.delete(record.id).await? {
                count += 1;
            }
        }
        if count > 0 {
            tracing::info!("Purged {} expired memories", count);
        }
        Ok(count)
    }

    /// Forget low-importance, long-idle records whose composite value is under the floor.
    pub async fn sweep_low_quality(&self) -> AnimaResult<usize> {
        let _guard = self.mutation_lock.lock().await;
        let now = self.clock.now();
        let floor = self.decay.config().low_quality_floor;
        let mut count = 0;
        for mut record in self.repo.query_active().await? {
            if !self.decay.is_low_quality_candidate(&record, now) {
                continue;
            }
            if self.decay.value_score(&record, now) < floor {
                record.is_forgotten = true;
                record.forgotten_at = Some(now);
                self.repo.persist(&record).await?;
                count += 1;
            }
        }
        if count > 0 {
            tracing::info!("Low-quality sweep flagged {} memories", count);
        }
        Ok(count)
    }

    /// Forgetting cycle, then low-quality sweep, then purge.
    pub async fn maintenance(&self) -> AnimaResult<MaintenanceReport> {
        let report = MaintenanceReport {
            forgotten: self.perform_forgetting_cycle().await?,
            low_quality: self.sweep_low_quality().await?,
            purged: self.purge_expired().await?,
        };
        tracing::debug!("Memory maintenance: {:?}", report);
        Ok(report)
    }

    /// Run [`Self::maintenance`] every `interval` until `shutdown` flips to true
    /// or its sender drops. A failed pass is logged and retried on the next tick.
    pub fn spawn_maintenance(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.maintenance().await {
                            tracing::warn!("Memory maintenance failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Memory maintenance stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    pub async fn statistics(&self) -> AnimaResult<MemoryStatistics> {
        let now = self.clock.now();
        let records = self.repo.query_all().await?;
        let mut stats = MemoryStatistics {
            total: records.len(),
            ..Default::default()
        };
        let mut strength_sum = 0.0f32;
        let mut importance_sum = 0.0f32;
        for r in records.iter() {
            if r.is_forgotten {
                stats.forgotten += 1;
                continue;
            }
            stats.active += 1;
            *stats.by_category.entry(r.category.name().to_string()).or_insert(0) += 1;
            let strength = self.decay.strength(r, now);
            strength_sum += strength;
            importance_sum += r.importance;
            if strength < 2.0 * self.decay.forget_threshold(r.importance) {
                stats.at_risk += 1;
            }
        }
        if stats.active > 0 {
            stats.average_strength = strength_sum / stats.active as f32;
            stats.average_importance = importance_sum / stats.active as f32;
        }
        Ok(stats)
    }

    async fn update<F>(&self, id: MemoryId, mutate: F) -> AnimaResult<Option<MemoryRecord>>
    where
        F: FnOnce(&mut MemoryRecord),
    {
        let _guard = self.mutation_lock.lock().await;
        let Some(mut record) = self.repo.load(id).await? else {
            return Ok(None);
        };
        mutate(&mut record);
        record.normalize();
        self.repo.persist(&record).await?;
        Ok(Some(record))
    }
}
