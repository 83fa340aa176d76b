// src/embedding/mod.rs
//! Embedding providers for the embedding stage.
//!
//! A provider is loaded once per process and shared by every concurrent match.
//! `SharedEmbedder` bounds how many encodes run at the same time and moves the
//! CPU-bound work off the async runtime.

pub mod hashing;
pub mod minilm;

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::env;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::utils::env::env_or;

pub use hashing::HashingEmbedder;
pub use minilm::MiniLmEmbedder;

pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Text to fixed-dimension vector.
pub trait EmbeddingProvider: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn model_version(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Sentence-transformer model loaded through candle.
    MiniLm,
    /// Character n-gram feature hashing, no model download.
    Hashing,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_repo: String,
    /// Encodes allowed to run at the same time.
    pub max_concurrent: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::MiniLm,
            model_repo: DEFAULT_MODEL_REPO.to_string(),
            max_concurrent: num_cpus::get().max(1),
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend = match env::var("EMBEDDING_BACKEND")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "hashing" | "hash" => EmbeddingBackend::Hashing,
            "" | "minilm" => EmbeddingBackend::MiniLm,
            other => {
                warn!("Unknown EMBEDDING_BACKEND '{}', using minilm", other);
                EmbeddingBackend::MiniLm
            }
        };
        Self {
            backend,
            model_repo: env::var("EMBEDDING_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model_repo),
            max_concurrent: env_or("EMBEDDING_CONCURRENCY", defaults.max_concurrent).max(1),
        }
    }

    pub fn log_config(&self) {
        info!(
            "🧠 Embedding: {:?} backend, model {}, {} concurrent encodes",
            self.backend, self.model_repo, self.max_concurrent
        );
    }
}

/// Loads the configured provider. Model downloads happen here.
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::MiniLm => {
            let embedder = MiniLmEmbedder::with_model(&config.model_repo)
                .with_context(|| format!("Failed to load embedding model {}", config.model_repo))?;
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::default())),
    }
}

/// Provider plus a concurrency bound.
pub struct SharedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    permits: Semaphore,
}

impl SharedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_concurrent: usize) -> Self {
        Self {
            provider,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    pub fn model_version(&self) -> String {
        self.provider.model_version()
    }

    /// Encodes every text on a blocking thread while holding one permit.
    pub async fn encode_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("Embedding semaphore closed")?;
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| provider.encode(text))
                .collect::<Result<Vec<_>>>()
        })
        .await
        .context("Embedding task panicked")?
    }

    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode_all(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding provider returned no vector"))
    }
}

static GLOBAL_EMBEDDER: OnceCell<Arc<SharedEmbedder>> = OnceCell::new();

/// Loads the process-wide embedder on first call; later calls return the same instance.
pub fn init_global_embedder(config: &EmbeddingConfig) -> Result<Arc<SharedEmbedder>> {
    let embedder = GLOBAL_EMBEDDER.get_or_try_init(|| -> Result<Arc<SharedEmbedder>> {
        info!("🧠 Loading {:?} embedding provider...", config.backend);
        let provider = build_provider(config)?;
        info!(
            "🧠 Embedding provider ready: {} ({} dimensions)",
            provider.model_version(),
            provider.dimension()
        );
        Ok(Arc::new(SharedEmbedder::new(provider, config.max_concurrent)))
    })?;
    Ok(Arc::clone(embedder))
}
