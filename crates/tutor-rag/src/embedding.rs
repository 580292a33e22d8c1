//! Offline hash-based embedding provider

use async_trait::async_trait;

use tutor_core::{EmbeddingProvider, Result};

/// Deterministic bag-of-words embeddings built from token hashes
///
/// No model and no network: similar wording gives similar vectors, which is
/// enough for local development and for ingesting without an embeddings key.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Stored vectors outlive the process, so the token hash must be stable
    /// across builds: md5, first eight bytes little-endian.
    fn bucket(&self, token: &str) -> (usize, u64) {
        let digest = md5::compute(token.as_bytes()).0;
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(head);
        ((hash % self.dimension as u64) as usize, hash)
    }

    /// Generate the embedding synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized_text = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>();

        let words: Vec<&str> = normalized_text.split_whitespace().collect();
        let mut embedding = vec![0.0f32; self.dimension];

        for (i, word) in words.iter().enumerate() {
            let (idx, hash) = self.bucket(word);
            let weight = 1.0 / (1.0 + i as f32 * 0.1);
            embedding[idx] += weight;

            if word.len() > 3 {
                let secondary_idx = ((hash >> 16) as usize) % self.dimension;
                embedding[secondary_idx] += weight * 0.5;
            }
        }

        for window in words.windows(2) {
            let (idx, _) = self.bucket(&format!("{} {}", window[0], window[1]));
            embedding[idx] += 0.3;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_fixed_dimension_and_unit_length() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed_text("ROS 2 nodes publish messages on topics");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(128);
        assert_eq!(embedder.embed_text("Gazebo simulation"), embedder.embed_text("Gazebo simulation"));
    }

    #[test]
    fn test_buckets_are_stable() {
        // md5("a") = 0cc175b9..., low byte 0x0c
        let v = HashEmbedder::new(16).embed_text("a");
        let mut expected = vec![0.0f32; 16];
        expected[12] = 1.0;
        assert_eq!(v, expected);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashEmbedder::new(16).embed_text("  !! ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_text("how do ros 2 nodes communicate");
        let related = embedder.embed_text("ros 2 nodes communicate using topics and services");
        let unrelated = embedder.embed_text("bipedal balance relies on the zero moment point");
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }
}
