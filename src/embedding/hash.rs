use super::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;

/// Deterministic offline embedding provider.
///
/// Bytes are folded into vector slots and the result is L2-normalized, so identical texts map to
/// identical vectors and texts sharing a prefix land close together under cosine similarity.
/// Useful for tests and air-gapped setups; it carries no semantic understanding.
pub struct HashEmbeddingProvider {
    vector_name: String,
    dimension: usize,
}

impl HashEmbeddingProvider {
    /// Construct a provider producing vectors of `dimension` floats.
    pub fn new(vector_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            vector_name: vector_name.into(),
            dimension,
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        if text.is_empty() || self.dimension == 0 {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % self.dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn vector_name(&self) -> &str {
        &self.vector_name
    }

    fn vector_size(&self) -> usize {
        self.dimension
    }
}
