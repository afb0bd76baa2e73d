//! Query-driven recall over the store.
//!
//! Embeds the query, ranks a snapshot of candidates and reinforces what was
//! returned. An embedding failure degrades to recency/importance ranking.

use crate::retrieval::{RankedMemory, RetrievalRanker, SearchFilter, SearchOptions};
use crate::store::MemoryStore;
use anima_core::config::RetrievalConfig;
use anima_core::{AnimaResult, Embedder, MemoryCategory};
use std::sync::Arc;

pub struct MemoryRecall {
    store: Arc<MemoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    ranker: RetrievalRanker,
    config: RetrievalConfig,
}

impl MemoryRecall {
    pub fn new(store: Arc<MemoryStore>, config: RetrievalConfig) -> Self {
        let ranker = RetrievalRanker::new(config.clone(), store.decay().clone());
        Self {
            store,
            embedder: None,
            ranker,
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn ranker(&self) -> &RetrievalRanker {
        &self.ranker
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Rank personal memories for `query`. Storage failures propagate.
    pub async fn recall(&self, query: &str, filter: SearchFilter) -> AnimaResult<Vec<RankedMemory>> {
        let options = SearchOptions::from_config(&self.config).with_filter(filter);
        let candidates = self.candidates(&options.filter).await?;
        let now = self.store.now();

        let results = match self.embed_query(query).await {
            Some(q) => self.ranker.search(&q, &candidates, &options, now),
            None => self.ranker.search_without_semantics(&candidates, &options, now),
        };
        self.reinforce(&results).await;
        Ok(results)
    }

    /// Rank general knowledge for `query`. Knowledge is static and not reinforced.
    pub async fn recall_knowledge(&self, query: &str) -> AnimaResult<Vec<RankedMemory>> {
        let options = SearchOptions::from_config(&self.config)
            .with_filter(SearchFilter::category(MemoryCategory::Knowledge));
        let candidates = self.candidates(&options.filter).await?;
        let now = self.store.now();

        Ok(match self.embed_query(query).await {
            Some(q) => self.ranker.search_knowledge(&q, &candidates, &options, now),
            None => self.ranker.search_without_semantics(&candidates, &options, now),
        })
    }

    async fn candidates(&self, filter: &SearchFilter) -> AnimaResult<Vec<anima_core::MemoryRecord>> {
        if filter.include_forgotten {
            self.store.all().await
        } else {
            self.store.active().await
        }
    }

    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(query).await {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Query embedding failed ({}), ranking without semantics", e);
                None
            }
        }
    }

    async fn reinforce(&self, results: &[RankedMemory]) {
        if !self.config.reinforce_on_recall {
            return;
        }
        for r in results {
            if let Err(e) = self.store.reinforce(r.record.id).await {
                tracing::warn!("Failed to reinforce recalled memory {}: {}", r.record.id, e);
            }
        }
    }
}
