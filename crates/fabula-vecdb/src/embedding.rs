//! Text embedding providers.
//!
//! The embedding model is an external collaborator; the store only needs a
//! deterministic `text → vector` function of fixed dimensionality.
//!
//! - [`HashEmbedder`]: offline feature-hashing bag of words (tests, dry runs)
//! - [`HttpEmbedder`](crate::http::HttpEmbedder): OpenAI-compatible `/embeddings` endpoint

use crate::error::{Result, VecDbError};

/// A deterministic text embedding function.
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output dimensionality, when known before the first call.
    fn dimensions(&self) -> Option<usize>;

    /// Short description for logs.
    fn name(&self) -> &str;
}

/// Feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets with a hash-derived sign; the result is L2-normalized.
/// Texts sharing words land close together under cosine distance, but this
/// is lexical overlap, not semantics.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// # Errors
    ///
    /// Returns `VecDbError::InvalidConfig` if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(VecDbError::InvalidConfig(
                "embedding dimensions must be positive".into(),
            ));
        }
        Ok(Self { dimensions })
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}
