use anima_core::{AnimaError, AnimaResult, Embedder};
use async_trait::async_trait;

pub type Embedding = Vec<f32>;

/// Calculate cosine similarity between two vectors
/// Returns a value between -1.0 and 1.0 (1.0 = identical direction)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot_product / (norm_a * norm_b);
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Offline embedder: hashes words and CJK characters into a fixed number of buckets.
///
/// Only lexical overlap is captured. Useful for simulations, the CLI, and as a
/// last-resort provider when no model is configured.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(8) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut v = vec![0.0f32; self.dims];
        for term in terms(text) {
            let h = fnv1a(term.as_bytes());
            let idx = (h % self.dims as u64) as usize;
            // Sign bit spreads collisions around zero
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> AnimaResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AnimaError::EmbeddingUnavailable("empty text".into()));
        }
        Ok(self.embed_sync(text))
    }
}

/// Lowercased ASCII words plus every non-ASCII alphanumeric character on its own.
fn terms(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            word.push(ch.to_ascii_lowercase());
            continue;
        }
        if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
        if !ch.is_ascii() && ch.is_alphanumeric() {
            out.push(ch.to_string());
        }
    }
    if !word.is_empty() {
        out.push(word);
    }
    out
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        // Mismatched or degenerate input
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_overlap() {
        let e = HashingEmbedder::new(4096);
        let cats = e.embed_sync("my cat likes fish");
        let cats2 = e.embed_sync("the cat likes fish a lot");
        let tax = e.embed_sync("quarterly tax filing deadline");
        assert!(cosine_similarity(&cats, &cats2) > cosine_similarity(&cats, &tax));
        assert!((cosine_similarity(&cats, &cats) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_cjk() {
        let e = HashingEmbedder::new(4096);
        let a = e.embed_sync("我喜欢猫");
        let b = e.embed_sync("猫很可爱");
        assert!(cosine_similarity(&a, &b) > 0.0);
    }

    #[tokio::test]
    async fn test_empty_text_is_unavailable() {
        let e = HashingEmbedder::default();
        assert!(matches!(
            e.embed("  ").await,
            Err(AnimaError::EmbeddingUnavailable(_))
        ));
    }
}
