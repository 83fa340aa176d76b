// src/embedding/minilm.rs
//! Sentence-transformer embeddings (all-MiniLM-L6-v2 by default) through candle.
//!
//! MiniLM sentence embeddings are the attention-masked mean of the token
//! states, L2 normalized so cosine similarity is a dot product.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use log::{debug, info};
use tokenizers::Tokenizer;

use crate::embedding::EmbeddingProvider;
use crate::utils::candle::{device, l2_normalize};

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
    dimension: usize,
}

impl MiniLmEmbedder {
    /// Downloads (or reads from the HuggingFace cache) and loads `model_name`.
    pub fn with_model(model_name: &str) -> Result<Self> {
        info!("Loading embedding model: {}", model_name);
        let device = device().clone();

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_name.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("Failed to download config.json")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer.json")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model.safetensors")?;
        debug!("Model files available in cache");

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(&config_path).context("Failed to read config.json")?,
        )
        .context("Failed to parse config.json")?;
        let dimension = config.hidden_size;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to build BERT model")?;

        info!(
            "Embedding model loaded successfully ({}, {} dimensions)",
            model_name, dimension
        );
        Ok(Self {
            model,
            tokenizer,
            device,
            model_name: model_name.to_string(),
            dimension,
        })
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut all_input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut all_attention_mask = Vec::with_capacity(texts.len() * max_len);
        let mut all_token_type_ids = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let mut ids = encoding.get_ids().to_vec();
            let mut attention = encoding.get_attention_mask().to_vec();
            let mut type_ids = encoding.get_type_ids().to_vec();
            ids.resize(max_len, 0);
            attention.resize(max_len, 0);
            type_ids.resize(max_len, 0);
            all_input_ids.extend(ids);
            all_attention_mask.extend(attention);
            all_token_type_ids.extend(type_ids);
        }

        let batch_size = texts.len();
        let input_ids = Tensor::from_vec(all_input_ids, (batch_size, max_len), &self.device)?;
        let attention_mask =
            Tensor::from_vec(all_attention_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids =
            Tensor::from_vec(all_token_type_ids, (batch_size, max_len), &self.device)?;

        // (batch, seq, hidden)
        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = output.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        let normalized = l2_normalize(&pooled)?;
        Ok(normalized.to_vec2::<f32>()?)
    }
}

impl EmbeddingProvider for MiniLmEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_batch(&[text])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model returned no embedding for input"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_version(&self) -> String {
        self.model_name.clone()
    }
}
