//! Long-term memory records.
//!
//! Bounded scalars are clamped on write through [`MemoryRecord::normalize`],
//! which every store mutation calls before persisting.

use crate::emotion::EmotionalState;
use crate::error::{AnimaError, AnimaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type MemoryId = Uuid;

/// Guard against NaN and Infinity in stored scalars.
/// If the value is NaN or Inf, replace with the provided fallback.
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in memory record, resetting to fallback {}", fallback);
        fallback
    }
}

/// Deserialize an f32, mapping null/NaN/Inf to 0.0 so a corrupt row never
/// poisons the decay math.
pub fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0))
}

/// Parse a memory id supplied by an outer layer.
pub fn parse_memory_id(raw: &str) -> AnimaResult<MemoryId> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| AnimaError::invalid(format!("malformed memory id '{raw}': {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    /// Something that happened ("we watched the fireworks")
    Episodic,
    /// Abstracted knowledge about the world
    Semantic,
    /// Who someone is
    Person,
    /// Likes and dislikes
    Preference,
    /// A concrete, checkable fact
    Fact,
    /// A date worth remembering every year
    Anniversary,
    /// General background knowledge, ranked with static importance/confidence
    Knowledge,
    Custom(String),
}

impl MemoryCategory {
    pub fn name(&self) -> &str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Person => "person",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Anniversary => "anniversary",
            Self::Knowledge => "knowledge",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Baseline importance used when no evaluator opinion is available.
    pub fn base_importance(&self) -> f32 {
        match self {
            Self::Anniversary => 0.8,
            Self::Person | Self::Preference => 0.6,
            Self::Fact | Self::Semantic | Self::Knowledge => 0.5,
            Self::Episodic => 0.4,
            Self::Custom(_) => 0.4,
        }
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = std::convert::Infallible;

    /// Unknown names become `Custom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Ok(match name.as_str() {
            "episodic" => Self::Episodic,
            "semantic" => Self::Semantic,
            "person" => Self::Person,
            "preference" => Self::Preference,
            "fact" => Self::Fact,
            "anniversary" => Self::Anniversary,
            "knowledge" => Self::Knowledge,
            _ => Self::Custom(name),
        })
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of long-term knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub content: String,
    pub category: MemoryCategory,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    /// 0.0 - 1.0
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub importance: f32,
    /// 0.0 - 1.0
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub confidence: f32,
    /// -1.0 - 1.0
    #[serde(default, deserialize_with = "deserialize_safe_f32")]
    pub emotional_valence: f32,
    #[serde(default)]
    pub emotion_tag: Option<EmotionalState>,
    /// 0.0 - 1.0
    #[serde(default, deserialize_with = "deserialize_safe_f32")]
    pub emotion_intensity: f32,

    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub reinforcement_count: u32,
    #[serde(default)]
    pub access_count: u32,

    /// 0.0 - 1.0, estimated from content shape at ingestion
    #[serde(default, deserialize_with = "deserialize_safe_f32")]
    pub recall_difficulty: f32,
    /// 0.0 - 1.0
    #[serde(default, deserialize_with = "deserialize_safe_f32")]
    pub context_relevance: f32,

    #[serde(default)]
    pub related_entities: BTreeSet<String>,
    #[serde(default)]
    pub related_characters: BTreeSet<String>,

    #[serde(default)]
    pub is_forgotten: bool,
    #[serde(default)]
    pub forgotten_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn new(content: impl Into<String>, category: MemoryCategory, now: DateTime<Utc>) -> Self {
        let importance = category.base_importance();
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            category,
            embedding: None,
            importance,
            confidence: 0.5,
            emotional_valence: 0.0,
            emotion_tag: None,
            emotion_intensity: 0.0,
            created_at: now,
            last_accessed_at: now,
            reinforcement_count: 0,
            access_count: 0,
            recall_difficulty: 0.0,
            context_relevance: 0.5,
            related_entities: BTreeSet::new(),
            related_characters: BTreeSet::new(),
            is_forgotten: false,
            forgotten_at: None,
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self.normalize();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self.normalize();
        self
    }

    pub fn with_emotion(mut self, tag: EmotionalState, valence: f32, intensity: f32) -> Self {
        self.emotion_tag = Some(tag);
        self.emotional_valence = valence;
        self.emotion_intensity = intensity;
        self.normalize();
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.related_entities.insert(entity.into());
        self
    }

    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.related_characters.insert(character.into());
        self
    }

    /// Clamp all values to valid ranges
    pub fn normalize(&mut self) {
        self.importance = sanitize_f32(self.importance, 0.5).clamp(0.0, 1.0);
        self.confidence = sanitize_f32(self.confidence, 0.5).clamp(0.0, 1.0);
        self.emotional_valence = sanitize_f32(self.emotional_valence, 0.0).clamp(-1.0, 1.0);
        self.emotion_intensity = sanitize_f32(self.emotion_intensity, 0.0).clamp(0.0, 1.0);
        self.recall_difficulty = sanitize_f32(self.recall_difficulty, 0.0).clamp(0.0, 1.0);
        self.context_relevance = sanitize_f32(self.context_relevance, 0.5).clamp(0.0, 1.0);
        if self.last_accessed_at < self.created_at {
            self.last_accessed_at = self.created_at;
        }
        if !self.is_forgotten {
            self.forgotten_at = None;
        }
    }

    /// Reject records that cannot be stored at all.
    pub fn validate(&self) -> AnimaResult<()> {
        if self.content.trim().is_empty() {
            return Err(AnimaError::invalid("memory content is empty"));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.is_empty() {
                return Err(AnimaError::invalid("embedding is empty"));
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(AnimaError::invalid("embedding contains NaN/Inf"));
            }
        }
        Ok(())
    }

    /// Emotional weight used by the decay model: the stronger of |valence| and intensity.
    pub fn emotional_weight(&self) -> f32 {
        self.emotional_valence.abs().max(self.emotion_intensity)
    }

    pub fn is_active(&self) -> bool {
        !self.is_forgotten
    }

    pub fn mentions(&self, entity: &str) -> bool {
        self.related_entities.contains(entity) || self.related_characters.contains(entity)
    }
}
