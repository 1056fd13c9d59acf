//! Deterministic local embedder
//!
//! Hashes character bigrams (and single characters, for one-syllable
//! Korean words) into a fixed number of buckets, then L2-normalises.
//! Good enough for lexical-semantic ranking without a model download.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::capabilities::Embedder;
use crate::errors::CapabilityError;

pub const DEFAULT_DIMENSIONS: usize = 256;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text.split_whitespace() {
            let chars: Vec<char> = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();

            for c in &chars {
                vector[self.bucket(&c.to_string())] += 0.5;
            }
            for pair in chars.windows(2) {
                let gram: String = pair.iter().collect();
                vector[self.bucket(&gram)] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }

    fn bucket(&self, gram: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        gram.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        Ok(self.embed_text(text))
    }
}

/// Cosine similarity; zero when either vector is empty or zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_normalised() {
        let embedder = HashingEmbedder::default();
        let vector = embedder.embed_text("출장비 부당 집행");
        assert_eq!(vector.len(), DEFAULT_DIMENSIONS);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let vector = HashingEmbedder::default().embed_text("   ");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("출장비 부당 집행");
        let close = embedder.embed_text("출장비를 부당하게 집행한 사례");
        let far = embedder.embed_text("채용 절차 위반");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn test_embedder_trait() {
        let embedder = HashingEmbedder::new(32);
        let vector = embedder.embed("audit").await.unwrap();
        assert_eq!(vector.len(), 32);
    }
}
