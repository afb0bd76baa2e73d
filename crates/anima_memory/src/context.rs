//! Token-budgeted context assembly for the upstream language model.
//!
//! Sections are emitted in a fixed priority order and items are never cut in
//! half: the first item that would overflow the budget ends assembly.

use crate::recall::MemoryRecall;
use crate::retrieval::SearchFilter;
use crate::tokens::estimate_tokens;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Section kinds in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    World,
    EntityProfile,
    RelationshipNetwork,
    Memories,
}

impl SectionKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::World => "World",
            Self::EntityProfile => "Profile",
            Self::RelationshipNetwork => "Relationships",
            Self::Memories => "Memories",
        }
    }

    fn header(self) -> String {
        format!("## {}\n", self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub items: Vec<String>,
}

impl ContextSection {
    pub fn new(kind: SectionKind, items: Vec<String>) -> Self {
        Self { kind, items }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Included sections, each with only the items that fit
    pub sections: Vec<ContextSection>,
    pub used_tokens: usize,
    pub budget: usize,
    /// True if at least one item was left out
    pub truncated: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&section.kind.header());
            for item in &section.items {
                out.push_str(&render_item(item));
            }
        }
        out
    }
}

fn render_item(item: &str) -> String {
    format!("- {}\n", item.trim())
}

/// Assemble sections under `budget` tokens.
///
/// A section header is charged together with the section's first item, so a
/// header never appears on its own. Empty items are skipped.
pub fn assemble_context(mut sections: Vec<ContextSection>, budget: usize) -> AssembledContext {
    sections.sort_by_key(|s| s.kind);
    let mut assembled = AssembledContext {
        budget,
        ..Default::default()
    };

    'outer: for section in sections {
        let mut included: Vec<String> = Vec::new();
        for item in section.items.iter().filter(|i| !i.trim().is_empty()) {
            let mut cost = estimate_tokens(&render_item(item));
            if included.is_empty() {
                cost += estimate_tokens(&section.kind.header());
            }
            if assembled.used_tokens + cost > budget {
                assembled.truncated = true;
                if !included.is_empty() {
                    assembled.sections.push(ContextSection::new(section.kind, included));
                }
                break 'outer;
            }
            assembled.used_tokens += cost;
            included.push(item.clone());
        }
        if !included.is_empty() {
            assembled.sections.push(ContextSection::new(section.kind, included));
        }
    }

    tracing::debug!(
        "Assembled context: {} items, {}/{} tokens{}",
        assembled.item_count(),
        assembled.used_tokens,
        budget,
        if assembled.truncated { " (truncated)" } else { "" }
    );
    assembled
}

/// World, profile and relationship lookups. Any failure skips that section.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn world_context(&self) -> Result<Vec<String>>;
    async fn entity_profile(&self, entity: &str) -> Result<Vec<String>>;
    async fn relationship_network(&self, entity: &str) -> Result<Vec<String>>;
}

pub struct ContextBuilder {
    recall: Arc<MemoryRecall>,
    profiles: Option<Arc<dyn ProfileSource>>,
    budget: usize,
}

impl ContextBuilder {
    pub fn new(recall: Arc<MemoryRecall>, budget: usize) -> Self {
        Self {
            recall,
            profiles: None,
            budget,
        }
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Build context for `query`, optionally about a specific entity.
    ///
    /// Lookups run concurrently; each one that fails contributes nothing.
    pub async fn build(&self, query: &str, entity: Option<&str>) -> AssembledContext {
        let world = async {
            match &self.profiles {
                Some(p) => degrade("world context", p.world_context().await),
                None => Vec::new(),
            }
        };
        let profile = async {
            match (&self.profiles, entity) {
                (Some(p), Some(e)) => degrade("entity profile", p.entity_profile(e).await),
                _ => Vec::new(),
            }
        };
        let network = async {
            match (&self.profiles, entity) {
                (Some(p), Some(e)) => degrade("relationship network", p.relationship_network(e).await),
                _ => Vec::new(),
            }
        };
        let memories = async {
            match self.recall.recall(query, SearchFilter::default()).await {
                Ok(ranked) => ranked.into_iter().map(|r| r.record.content).collect(),
                Err(e) => {
                    tracing::warn!("Memory recall failed ({}), context built without memories", e);
                    Vec::new()
                }
            }
        };

        let (world, profile, network, memories) = tokio::join!(world, profile, network, memories);
        assemble_context(
            vec![
                ContextSection::new(SectionKind::World, world),
                ContextSection::new(SectionKind::EntityProfile, profile),
                ContextSection::new(SectionKind::RelationshipNetwork, network),
                ContextSection::new(SectionKind::Memories, memories),
            ],
            self.budget,
        )
    }
}

fn degrade(what: &str, result: Result<Vec<String>>) -> Vec<String> {
    result.unwrap_or_else(|e| {
        tracing::warn!("{} lookup failed ({}), skipping section", what, e);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashingEmbedder, MemoryStore};
    use anima_core::config::{MemoryConfig, RetrievalConfig};
    use anima_core::{InMemoryRepository, ManualClock, MemoryCategory};
    use chrono::{TimeZone, Utc};

    fn section(kind: SectionKind, items: &[&str]) -> ContextSection {
        ContextSection::new(kind, items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_priority_order_regardless_of_input_order() {
        let ctx = assemble_context(
            vec![
                section(SectionKind::Memories, &["we met at the station"]),
                section(SectionKind::World, &["it is raining"]),
                section(SectionKind::EntityProfile, &["Alice, 28, nurse"]),
            ],
            1000,
        );
        let kinds: Vec<_> = ctx.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SectionKind::World, SectionKind::EntityProfile, SectionKind::Memories]
        );
        assert!(!ctx.truncated);
        assert!(ctx.render().starts_with("## World\n- it is raining\n"));
    }

    #[test]
    fn test_stops_at_first_overflow() {
        let world = section(SectionKind::World, &["aaaa aaaa"]);
        let cost_world = estimate_tokens("## World\n") + estimate_tokens("- aaaa aaaa\n");
        let big = "b".repeat(400);
        let memories = section(SectionKind::Memories, &["short", &big, "tiny"]);
        let cost_first = estimate_tokens("## Memories\n") + estimate_tokens("- short\n");

        let ctx = assemble_context(vec![world, memories], cost_world + cost_first + 5);
        assert!(ctx.truncated);
        assert_eq!(ctx.item_count(), 2);
        // "tiny" would fit but comes after the overflowing item
        assert!(!ctx.render().contains("tiny"));
        assert!(ctx.used_tokens <= ctx.budget);
    }

    #[test]
    fn test_zero_budget_is_empty() {
        let ctx = assemble_context(vec![section(SectionKind::World, &["x"])], 0);
        assert!(ctx.is_empty());
        assert!(ctx.truncated);
    }

    struct FlakyProfiles;

    #[async_trait]
    impl ProfileSource for FlakyProfiles {
        async fn world_context(&self) -> Result<Vec<String>> {
            Ok(vec!["It is a quiet Sunday".into()])
        }
        async fn entity_profile(&self, entity: &str) -> Result<Vec<String>> {
            Ok(vec![format!("{entity} likes hiking")])
        }
        async fn relationship_network(&self, _entity: &str) -> Result<Vec<String>> {
            anyhow::bail!("graph offline")
        }
    }

    #[tokio::test]
    async fn test_builder_degrades_failed_sources() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let embedder = Arc::new(HashingEmbedder::new(1024));
        let store = Arc::new(
            MemoryStore::new(Arc::new(InMemoryRepository::new()), clock, MemoryConfig::default())
                .with_embedder(embedder.clone()),
        );
        store.ingest("Alice went hiking at Mount Takao", MemoryCategory::Episodic, "").await.unwrap();
        let recall = Arc::new(MemoryRecall::new(store, RetrievalConfig::default()).with_embedder(embedder));

        let builder = ContextBuilder::new(recall, 500).with_profiles(Arc::new(FlakyProfiles));
        let ctx = builder.build("Alice hiking", Some("Alice")).await;
        let kinds: Vec<_> = ctx.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SectionKind::World, SectionKind::EntityProfile, SectionKind::Memories]
        );
        assert!(ctx.render().contains("Mount Takao"));
    }
}
