//! Vector embedding abstraction layer.
//!
//! The importance scorer measures how relevant a memory is to the current
//! context through cosine similarity of embeddings. Any sentence-embedding
//! service can be plugged in behind [`EmbeddingProvider`]; two local
//! providers ship with the crate.

use crate::error::{Result, ReverieError};
use crate::types::Embedding;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Generate vector embeddings from text.
///
/// Implementations must be `Send + Sync` for use from async contexts.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Embedding`] if the model fails to produce
    /// an embedding.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embed a batch of texts.
    ///
    /// Default implementation calls `embed` in a loop.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding in the batch fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A human-readable name for the model.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Cosine similarity
// ---------------------------------------------------------------------------

/// Compute the cosine similarity between two embedding vectors.
///
/// Returns a value in \[-1.0, 1.0\]. Returns `0.0` if either vector has
/// zero magnitude or the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    if a.0.len() != b.0.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut mag_a = 0.0_f32;
    let mut mag_b = 0.0_f32;

    for (x, y) in a.0.iter().zip(b.0.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Stub provider
// ---------------------------------------------------------------------------

/// A stub embedding provider that returns zero-vectors.
///
/// Every relevance computed with it is `0`, which reduces importance to
/// recency, frequency and sentiment.
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    /// Create a new stub provider with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dims: dimensions }
    }
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for StubEmbeddingProvider {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(Embedding(vec![0.0; self.dims]))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-zero-vector"
    }
}

// ---------------------------------------------------------------------------
// Feature-hashing provider
// ---------------------------------------------------------------------------

/// A deterministic bag-of-words embedder.
///
/// Each lowercase word token (and each adjacent word pair) is hashed with
/// 64-bit FNV-1a into one of `dims` buckets with a hash-derived sign; the
/// result is L2-normalized. Identical texts embed identically and texts
/// sharing vocabulary score a positive similarity, which is all the
/// importance scorer needs when no model service is available.
pub struct HashingEmbeddingProvider {
    dims: usize,
}

impl HashingEmbeddingProvider {
    /// Create a hashing provider with `dimensions` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Embedding`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(ReverieError::Embedding(
                "hashing embedder needs at least one dimension".into(),
            ));
        }
        Ok(Self { dims: dimensions })
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = fnv1a(feature.as_bytes());
        // Truncation is fine: only the low bits pick the bucket.
        #[allow(clippy::cast_possible_truncation)]
        let idx = (hash % self.dims as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dims: 256 }
    }
}

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let tokens = tokenize(text);
        let mut raw = vec![0.0_f32; self.dims];

        for token in &tokens {
            let (idx, sign) = self.bucket(token);
            raw[idx] += sign;
        }
        for pair in tokens.windows(2) {
            let (idx, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            raw[idx] += 0.5 * sign;
        }

        let mag: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        if mag < f32::EPSILON {
            return Ok(Embedding(raw));
        }
        Ok(Embedding(raw.into_iter().map(|x| x / mag).collect()))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "fnv-feature-hashing"
    }
}

/// Split text into lowercase alphanumeric word tokens. Apostrophes inside a
/// word are kept so that contractions stay a single token.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = Embedding(vec![1.0, 2.0, 3.0]);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_guards_zero_and_mismatched_vectors() {
        let zero = Embedding(vec![0.0; 3]);
        let v = Embedding(vec![1.0, 0.0, 0.0]);
        assert!(cosine_similarity(&zero, &v).abs() < f32::EPSILON);
        assert!(cosine_similarity(&v, &Embedding(vec![1.0, 0.0])).abs() < f32::EPSILON);
    }

    #[test]
    fn hashing_embedder_is_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(64).expect("provider");
        let a = provider.embed("The harvest festival starts at dawn").expect("embed");
        let b = provider.embed("the harvest festival starts at dawn!").expect("embed");
        assert_eq!(a, b);
        let norm: f32 = a.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let provider = HashingEmbeddingProvider::default();
        let base = provider.embed("we should repair the old bridge").expect("embed");
        let near = provider.embed("the old bridge needs repair").expect("embed");
        let far = provider.embed("quantum chromodynamics lecture notes").expect("embed");
        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8).expect("provider");
        let e = provider.embed("   ...  ").expect("embed");
        assert!(e.0.iter().all(|x| x.abs() < f32::EPSILON));
        assert!(HashingEmbeddingProvider::new(0).is_err());
    }

    #[test]
    fn tokenize_keeps_contractions() {
        assert_eq!(tokenize("I'm panicking, 'really'!"), vec!["i'm", "panicking", "really"]);
    }
}
