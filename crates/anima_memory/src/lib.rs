//! # Anima Memory
//!
//! Long-term memory for the companion:
//!
//! - [`DecayModel`]: Ebbinghaus-style strength, recomputed on demand
//! - [`MemoryStore`]: ingestion, reinforcement, forgetting and cleanup
//! - [`RetrievalRanker`] / [`MemoryRecall`]: multi-factor ranking with
//!   graceful degradation when embeddings are unavailable
//! - [`assemble_context`] / [`ContextBuilder`]: token-budgeted prompt context

pub mod context;
pub mod decay;
pub mod embedding;
pub mod evaluator;
pub mod recall;
pub mod retrieval;
pub mod store;
pub mod tokens;

pub use context::{
    assemble_context, AssembledContext, ContextBuilder, ContextSection, ProfileSource, SectionKind,
};
pub use decay::{estimate_recall_difficulty, DecayModel};
pub use embedding::{cosine_similarity, Embedding, HashingEmbedder};
pub use evaluator::{parse_evaluation, FallbackEvaluator, HeuristicEvaluator, LlmEvaluator};
pub use recall::MemoryRecall;
pub use retrieval::{RankedMemory, RetrievalRanker, SearchFilter, SearchOptions};
pub use store::{MaintenanceReport, MemoryStatistics, MemoryStore};
pub use tokens::{estimate_tokens, is_wide_char};
