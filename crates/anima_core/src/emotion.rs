//! Discrete emotional states.
//!
//! The set is closed on purpose: every table keyed by state is an exhaustive
//! `match`, so adding a state is a compile error until each table covers it.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Happy,
    Excited,
    #[default]
    Calm,
    Curious,
    Worried,
    Sad,
    Angry,
    Shy,
    Tired,
    Touched,
    Jealous,
    Disappointed,
    Neglected,
    Lonely,
}

/// Coarse valence class of a discrete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    Positive,
    Neutral,
    Negative,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 14] = [
        Self::Happy,
        Self::Excited,
        Self::Calm,
        Self::Curious,
        Self::Worried,
        Self::Sad,
        Self::Angry,
        Self::Shy,
        Self::Tired,
        Self::Touched,
        Self::Jealous,
        Self::Disappointed,
        Self::Neglected,
        Self::Lonely,
    ];

    pub fn valence(self) -> Valence {
        match self {
            Self::Happy | Self::Excited | Self::Curious | Self::Touched => Valence::Positive,
            Self::Calm | Self::Shy | Self::Tired => Valence::Neutral,
            Self::Worried
            | Self::Sad
            | Self::Angry
            | Self::Jealous
            | Self::Disappointed
            | Self::Neglected
            | Self::Lonely => Valence::Negative,
        }
    }

    pub fn is_positive(self) -> bool {
        self.valence() == Valence::Positive
    }

    pub fn is_negative(self) -> bool {
        self.valence() == Valence::Negative
    }

    /// How strongly this state pushes toward starting a conversation (0.0 - 1.0).
    pub fn speech_drive(self) -> f32 {
        match self {
            Self::Excited => 0.9,
            Self::Lonely => 0.85,
            Self::Neglected => 0.8,
            Self::Happy => 0.75,
            Self::Touched => 0.7,
            Self::Curious => 0.7,
            Self::Jealous => 0.6,
            Self::Worried => 0.55,
            Self::Disappointed => 0.4,
            Self::Sad => 0.35,
            Self::Calm => 0.3,
            Self::Angry => 0.25,
            Self::Shy => 0.2,
            Self::Tired => 0.1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Excited => "excited",
            Self::Calm => "calm",
            Self::Curious => "curious",
            Self::Worried => "worried",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Shy => "shy",
            Self::Tired => "tired",
            Self::Touched => "touched",
            Self::Jealous => "jealous",
            Self::Disappointed => "disappointed",
            Self::Neglected => "neglected",
            Self::Lonely => "lonely",
        }
    }

    /// Natural language description for LLM context injection
    pub fn describe(self) -> &'static str {
        match self {
            Self::Happy => "心情不错，很开心",
            Self::Excited => "兴奋，有点坐不住",
            Self::Calm => "情绪平稳",
            Self::Curious => "对什么都很好奇",
            Self::Worried => "有些担心",
            Self::Sad => "情绪低落",
            Self::Angry => "正在生气",
            Self::Shy => "有点害羞",
            Self::Tired => "累了，想休息",
            Self::Touched => "被感动了",
            Self::Jealous => "有点吃醋",
            Self::Disappointed => "有些失望",
            Self::Neglected => "觉得被冷落了",
            Self::Lonely => "感到孤单",
        }
    }
}

impl std::fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EmotionalState {
    type Err = crate::AnimaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.label() == needle)
            .ok_or_else(|| crate::AnimaError::invalid(format!("unknown emotional state: {s}")))
    }
}
