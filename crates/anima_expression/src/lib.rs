//! # Anima Expression
//!
//! Whether, when and how urgently the companion should speak up on its own.
//!
//! - [`InteractionTracker`]: bounded rolling history of who talked with whom
//! - [`SignalCollector`]: concurrent sampling of the six decision factors
//! - [`DecisionScorer`]: weighted score, agreement confidence, timing and priority
//! - [`DecisionLoop`]: the periodic tick that ties it together

pub mod decision;
pub mod decision_loop;
pub mod interaction;
pub mod signals;

pub use decision::{
    DecisionScorer, Factor, Priority, RelationTier, Scores, Signals, Situation, SpeakDecision,
    Timing,
};
pub use decision_loop::{DecisionLoop, DecisionTick};
pub use interaction::{InteractionStats, InteractionTracker};
pub use signals::{
    EmotionSignal, RelationSignal, SharedSignal, SignalCollector, SignalProvider, TimeSignal,
};
