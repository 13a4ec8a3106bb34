//! Text embedding seam for the evidence cache.
//!
//! The cache only needs "text in, unit-length vector out", so the model sits
//! behind a trait and tests can inject a deterministic stand-in. Production
//! uses fastembed's AllMiniLML6V2, the same sentence encoder family the
//! evidence store was tuned against.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::RwLock;
use tracing::info;

/// Converts text into fixed-width vectors comparable by inner product.
///
/// Implementations must return one vector per input text, already
/// L2-normalised so that `dot_product` equals cosine similarity.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(vec: &mut Vec<f32>) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec {
            *x /= norm;
        }
    }
}

/// Inner product of two vectors; cosine similarity when both are unit length.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Embedder backed by a local fastembed model, loaded on first use.
pub struct FastEmbedder {
    model: Arc<RwLock<Option<TextEmbedding>>>,
}

impl FastEmbedder {
    /// Create the embedder without loading the model yet. The ~90MB ONNX
    /// model is fetched and initialised on the first `embed` call.
    pub fn new() -> Self {
        Self {
            model: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self.model.write().await;
        if guard.is_none() {
            info!("Loading embedding model: AllMiniLML6V2");
            let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                .context("failed to initialise embedding model")?;
            *guard = Some(model);
        }
        let model = guard
            .as_mut()
            .context("embedding model missing after initialisation")?;

        let mut embeddings = model
            .embed(texts.to_vec(), None)
            .context("embedding inference failed")?;
        for emb in &mut embeddings {
            normalize(emb);
        }
        Ok(embeddings)
    }
}
