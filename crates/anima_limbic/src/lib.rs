//! # Anima Limbic System
//!
//! Fast, non-verbal state regulation for the companion:
//!
//! - **Emotion**: a closed set of discrete states with asymmetric transition
//!   costs. Recovery toward calm is slow after negative states, activation out
//!   of calm is quick.
//! - **Biology**: time-of-day baseline energy reduced by conversational
//!   fatigue, which recovers while idle.
//!
//! Both engines keep their mutable state behind an async `RwLock` so the
//! decision loop, interaction recording and inspection can run concurrently.

mod biology;
mod emotion_model;
mod engine;
mod heartbeat;
mod transition;

pub use biology::{BiologicalClock, BiologicalState, FatigueAccumulation, TimeOfDay};
pub use emotion_model::{EmotionModel, SimilarityGroup};
pub use engine::{EmotionEngine, EmotionSnapshot};
pub use heartbeat::HeartbeatConfig;
pub use transition::EmotionTransition;
