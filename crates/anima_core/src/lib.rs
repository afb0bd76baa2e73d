pub mod clock;
pub mod config;
pub mod emotion;
pub mod error;
pub mod record;
pub mod repository;

pub use clock::{days_between, Clock, ManualClock, SystemClock};
pub use config::AnimaConfig;
pub use emotion::{EmotionalState, Valence};
pub use error::{AnimaError, AnimaResult};
pub use record::{parse_memory_id, sanitize_f32, MemoryCategory, MemoryId, MemoryRecord};
pub use repository::InMemoryRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Contracts implemented by collaborators outside this core (providers,
// persistence adapters). Every call site wraps them with a fallback path.

/// Text -> vector. Failures surface as `EmbeddingUnavailable`.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AnimaResult<Vec<f32>>;
}

/// Prompt -> completion text.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn chat_complete(&self, prompt: &str) -> AnimaResult<String>;
}

/// Storage adapter for memory records. Failures surface as `Storage`.
///
/// `persist` replaces the whole record, so readers never see a partial write.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn persist(&self, record: &MemoryRecord) -> AnimaResult<()>;
    async fn load(&self, id: MemoryId) -> AnimaResult<Option<MemoryRecord>>;
    async fn query_active(&self) -> AnimaResult<Vec<MemoryRecord>>;
    async fn query_all(&self) -> AnimaResult<Vec<MemoryRecord>>;
    /// Returns false when the id was unknown.
    async fn delete(&self, id: MemoryId) -> AnimaResult<bool>;
}

/// Importance/confidence judgement for new content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub importance: f32,
    pub confidence: f32,
}

impl Evaluation {
    pub fn new(importance: f32, confidence: f32) -> Self {
        Self {
            importance: sanitize_f32(importance, 0.5).clamp(0.0, 1.0),
            confidence: sanitize_f32(confidence, 0.5).clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
pub trait ImportanceEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        content: &str,
        category: &MemoryCategory,
        context: &str,
    ) -> AnimaResult<Evaluation>;

    /// Name for logging.
    fn name(&self) -> &str;
}
