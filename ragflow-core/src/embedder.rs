//! `Embedder` consumed interface, used by retrieval engines that need
//! query-time vectors (the engines themselves live outside this crate).

use async_trait::async_trait;

use crate::error::CoreError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
    fn dimension(&self) -> usize;
}

/// Deterministic mock embedder for tests: hashes text into a fixed-size
/// vector rather than calling a real model.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let mut vector = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimension] += byte as f32;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
