//! Importance/confidence evaluation for new content.
//!
//! Two-stage: the language-model evaluator is tried first, and on any failure
//! or timeout the deterministic heuristic takes over with the same signature.

use anima_core::{
    AnimaError, AnimaResult, ChatCompleter, Evaluation, ImportanceEvaluator, MemoryCategory,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Heuristic
// ============================================================================

/// Words that mark content as worth keeping.
const SALIENT_KEYWORDS: &[&str] = &[
    "love", "hate", "birthday", "anniversary", "important", "remember", "never forget",
    "promise", "always", "favorite", "favourite", "allergic", "afraid", "dream",
    "爱", "讨厌", "喜欢", "生日", "纪念日", "重要", "记住", "永远", "答应", "最喜欢", "过敏", "害怕", "梦想",
];

/// Filler that rarely deserves long-term storage.
const TRIVIAL_MARKERS: &[&str] = &["ok", "okay", "lol", "haha", "hmm", "嗯", "哈哈", "好的", "哦"];

/// Hedges lower confidence.
const HEDGES: &[&str] = &[
    "maybe", "perhaps", "probably", "i think", "might", "not sure", "i guess",
    "可能", "也许", "好像", "大概", "不确定", "应该是",
];

#[derive(Debug, Clone, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Pure scoring function behind [`ImportanceEvaluator::evaluate`].
    pub fn score(&self, content: &str, category: &MemoryCategory) -> Evaluation {
        let text = content.trim().to_lowercase();
        if text.is_empty() {
            return Evaluation::new(0.0, 0.0);
        }

        let mut importance = category.base_importance();
        let salient = SALIENT_KEYWORDS.iter().filter(|k| text.contains(*k)).count();
        importance += (salient as f32 * 0.15).min(0.3);
        let length = text.chars().count();
        importance += (length as f32 / 200.0).min(1.0) * 0.1;
        if length <= 12 && TRIVIAL_MARKERS.iter().any(|m| text == *m || text.starts_with(m)) {
            importance -= 0.2;
        }

        let mut confidence: f32 = 0.6;
        let hedges = HEDGES.iter().filter(|h| text.contains(*h)).count();
        confidence -= (hedges as f32 * 0.15).min(0.3);
        if text.chars().any(|c| c.is_ascii_digit()) {
            confidence += 0.1;
        }
        if text.ends_with('?') || text.ends_with('？') {
            confidence -= 0.1;
        }

        Evaluation::new(importance, confidence)
    }
}

#[async_trait]
impl ImportanceEvaluator for HeuristicEvaluator {
    async fn evaluate(
        &self,
        content: &str,
        category: &MemoryCategory,
        _context: &str,
    ) -> AnimaResult<Evaluation> {
        Ok(self.score(content, category))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

// ============================================================================
// Language model
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    importance: f32,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

pub struct LlmEvaluator {
    completer: Arc<dyn ChatCompleter>,
    timeout: Duration,
}

impl LlmEvaluator {
    pub fn new(completer: Arc<dyn ChatCompleter>) -> Self {
        Self {
            completer,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_prompt(content: &str, category: &MemoryCategory, context: &str) -> String {
        let mut prompt = String::from(
            "Rate how important it is for a companion to remember the following content \
             long-term, and how confident you are that it is accurate.\n\
             Reply with JSON only: {\"importance\": 0.0-1.0, \"confidence\": 0.0-1.0}\n\n",
        );
        prompt.push_str(&format!("Category: {}\n", category));
        if !context.trim().is_empty() {
            prompt.push_str(&format!("Context: {}\n", context.trim()));
        }
        prompt.push_str(&format!("Content: {}\n", content.trim()));
        prompt
    }
}

/// Parse an evaluator reply, tolerating prose or code fences around the JSON.
pub fn parse_evaluation(text: &str) -> AnimaResult<Evaluation> {
    let trimmed = text.trim();
    let raw = serde_json::from_str::<RawEvaluation>(trimmed).or_else(|_| {
        let json = extract_balanced_braces(trimmed).ok_or_else(|| {
            AnimaError::EvaluatorUnavailable(format!("no JSON object in reply: {trimmed}"))
        })?;
        serde_json::from_str::<RawEvaluation>(json)
            .map_err(|e| AnimaError::EvaluatorUnavailable(format!("malformed reply: {e}")))
    })?;
    if !raw.importance.is_finite() {
        return Err(AnimaError::EvaluatorUnavailable("importance is not a number".into()));
    }
    Ok(Evaluation::new(raw.importance, raw.confidence))
}

/// Extract the first balanced `{...}` substring.
fn extract_balanced_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl ImportanceEvaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        content: &str,
        category: &MemoryCategory,
        context: &str,
    ) -> AnimaResult<Evaluation> {
        let prompt = Self::build_prompt(content, category, context);
        let reply = match tokio::time::timeout(self.timeout, self.completer.chat_complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(AnimaError::EvaluatorUnavailable(e.to_string())),
            Err(_) => {
                return Err(AnimaError::EvaluatorUnavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
        };
        parse_evaluation(&reply)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

// ============================================================================
// Fallback composition
// ============================================================================

/// Tries `primary`, falls through to the heuristic on any error. Never fails.
pub struct FallbackEvaluator {
    primary: Arc<dyn ImportanceEvaluator>,
    fallback: HeuristicEvaluator,
}

impl FallbackEvaluator {
    pub fn new(primary: Arc<dyn ImportanceEvaluator>) -> Self {
        Self {
            primary,
            fallback: HeuristicEvaluator,
        }
    }
}

#[async_trait]
impl ImportanceEvaluator for FallbackEvaluator {
    async fn evaluate(
        &self,
        content: &str,
        category: &MemoryCategory,
        context: &str,
    ) -> AnimaResult<Evaluation> {
        match self.primary.evaluate(content, category, context).await {
            Ok(eval) => Ok(eval),
            Err(e) => {
                tracing::warn!(
                    "Evaluator '{}' failed ({}), using heuristic fallback",
                    self.primary.name(),
                    e
                );
                Ok(self.fallback.score(content, category))
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
