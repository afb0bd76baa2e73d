//! Multi-factor relevance ranking.
//!
//! Pure functions over a candidate snapshot. The ranker never touches storage;
//! [`crate::MemoryRecall`] feeds it and applies reinforcement afterwards.

use crate::decay::DecayModel;
use crate::embedding::cosine_similarity;
use anima_core::config::RetrievalConfig;
use anima_core::{days_between, sanitize_f32, MemoryCategory, MemoryRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Saturation point of the access-frequency score.
const ACCESS_SATURATION: f32 = 100.0;

/// Which records are eligible at all, before any scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Empty means every category
    pub categories: Vec<MemoryCategory>,
    /// Only records mentioning this entity or character
    pub entity: Option<String>,
    pub min_importance: Option<f32>,
    pub include_forgotten: bool,
}

impl SearchFilter {
    pub fn category(category: MemoryCategory) -> Self {
        Self {
            categories: vec![category],
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_min_importance(mut self, min: f32) -> Self {
        self.min_importance = Some(min);
        self
    }

    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if record.is_forgotten && !self.include_forgotten {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&record.category) {
            return false;
        }
        if let Some(entity) = &self.entity {
            if !record.mentions(entity) {
                return false;
            }
        }
        match self.min_importance {
            Some(min) => record.importance >= min,
            None => true,
        }
    }
}

/// Ranking knobs for a single search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_similarity: f32,
    pub filter: SearchFilter,
}

impl SearchOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_similarity: config.min_similarity,
            filter: SearchFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMemory {
    pub record: MemoryRecord,
    /// Cosine similarity; 0 when ranked without semantics
    pub similarity: f32,
    pub recency: f32,
    pub access: f32,
    pub strength: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalRanker {
    config: RetrievalConfig,
    decay: DecayModel,
}

impl RetrievalRanker {
    pub fn new(config: RetrievalConfig, decay: DecayModel) -> Self {
        Self { config, decay }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// `e^(-age_days / half_life)`, age measured from creation.
    pub fn recency_score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f32 {
        let age = days_between(record.created_at, now);
        (-age / self.config.half_life_days as f64).exp() as f32
    }

    /// `ln(1 + n) / ln(101)`, saturating at 1.0 around a hundred accesses.
    pub fn access_score(access_count: u32) -> f32 {
        ((1.0 + access_count as f32).ln() / (1.0 + ACCESS_SATURATION).ln()).min(1.0)
    }

    fn similarity(query: &[f32], record: &MemoryRecord) -> f32 {
        record
            .embedding
            .as_deref()
            .map(|e| cosine_similarity(query, e))
            .unwrap_or(0.0)
    }

    /// Rank personal memories against a query embedding.
    pub fn search(
        &self,
        query: &[f32],
        candidates: &[MemoryRecord],
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> Vec<RankedMemory> {
        let c = &self.config;
        let ranked = candidates
            .iter()
            .filter(|r| options.filter.matches(r))
            .filter_map(|r| {
                let similarity = Self::similarity(query, r);
                if similarity < options.min_similarity {
                    return None;
                }
                let recency = self.recency_score(r, now);
                let access = Self::access_score(r.access_count);
                let strength = self.decay.strength(r, now);
                let score = c.similarity_weight * similarity
                    + c.recency_weight * recency
                    + c.importance_weight * r.importance
                    + c.access_weight * access
                    + c.strength_weight * strength;
                Some(RankedMemory {
                    record: r.clone(),
                    similarity,
                    recency,
                    access,
                    strength,
                    score: sanitize_f32(score, 0.0),
                })
            })
            .collect();
        finish(ranked, options.top_k)
    }

    /// Rank general knowledge: static importance/confidence replace access frequency and decay.
    pub fn search_knowledge(
        &self,
        query: &[f32],
        candidates: &[MemoryRecord],
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> Vec<RankedMemory> {
        let c = &self.config;
        let ranked = candidates
            .iter()
            .filter(|r| options.filter.matches(r))
            .filter_map(|r| {
                let similarity = Self::similarity(query, r);
                if similarity < options.min_similarity {
                    return None;
                }
                let recency = self.recency_score(r, now);
                let score = c.knowledge_similarity_weight * similarity
                    + c.knowledge_recency_weight * recency
                    + c.knowledge_importance_weight * r.importance
                    + c.knowledge_confidence_weight * r.confidence;
                Some(RankedMemory {
                    record: r.clone(),
                    similarity,
                    recency,
                    access: Self::access_score(r.access_count),
                    strength: self.decay.strength(r, now),
                    score: sanitize_f32(score, 0.0),
                })
            })
            .collect();
        finish(ranked, options.top_k)
    }

    /// Degraded ranking when the query could not be embedded.
    ///
    /// The similarity term is dropped and `min_similarity` is not applied.
    pub fn search_without_semantics(
        &self,
        candidates: &[MemoryRecord],
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> Vec<RankedMemory> {
        let c = &self.config;
        let ranked = candidates
            .iter()
            .filter(|r| options.filter.matches(r))
            .map(|r| {
                let recency = self.recency_score(r, now);
                let access = Self::access_score(r.access_count);
                let strength = self.decay.strength(r, now);
                let score = c.recency_weight * recency
                    + c.importance_weight * r.importance
                    + c.access_weight * access
                    + c.strength_weight * strength;
                RankedMemory {
                    record: r.clone(),
                    similarity: 0.0,
                    recency,
                    access,
                    strength,
                    score: sanitize_f32(score, 0.0),
                }
            })
            .collect();
        finish(ranked, options.top_k)
    }
}

/// Stable sort by descending score, then truncate. Ties keep input order.
fn finish(mut ranked: Vec<RankedMemory>, top_k: usize) -> Vec<RankedMemory> {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    tracing::debug!("Ranked {} memories", ranked.len());
    ranked
}
