//! Dense embeddings and cross-encoder relevance scoring on candle.
//!
//! `EmbeddingModel` runs an XLM-RoBERTa encoder (E5 / BGE family) with masked
//! mean pooling. `FakeEmbedder` is a hashing stand-in for tests and offline runs.

mod device;
mod pool;
mod tokenize;
pub mod cross_encoder;

pub use cross_encoder::CrossEncoderScorer;
pub use device::select_device;
pub use pool::masked_mean_l2;

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docqa_core::config::{expand_path, ModelSettings};
use docqa_core::traits::Embedder;

const E5_MAX_LEN: usize = 512;

pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize }

impl EmbeddingModel {
    pub fn load(model_dir: &Path, device: Device) -> Result<Self> {
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = read_hidden_size(&raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: E5_MAX_LEN })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let emb = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb_cpu: Vec<f32> = emb.to_device(&Device::Cpu)?.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?;
        if emb_cpu.len() != self.dim { return Err(anyhow!("embedding has {} dims, expected {}", emb_cpu.len(), self.dim)); }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 500 { warn!(elapsed_ms = elapsed, "slow embedding"); }
        Ok(emb_cpu)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Hashes whitespace tokens into a fixed-size unit vector.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } } }

impl FakeEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { E5_MAX_LEN }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_one(t)).collect()) }
}

/// Embeds `texts` after prepending `prefix` (E5 expects "query: " / "passage: ").
pub fn embed_prefixed(embedder: &dyn Embedder, prefix: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if prefix.is_empty() { return embedder.embed_batch(texts); }
    let prefixed: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();
    embedder.embed_batch(&prefixed)
}

pub fn load_embedder(settings: &ModelSettings) -> Result<Arc<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake_embeddings || env_fake {
        info!(dim = settings.embedding_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.embedding_dim)));
    }
    let model_dir = expand_path(&settings.embedding_dir);
    let model = EmbeddingModel::load(&model_dir, select_device())?;
    if model.dim() != settings.embedding_dim {
        return Err(anyhow!("model at {} produces {} dims but embedding_dim is {}", model_dir.display(), model.dim(), settings.embedding_dim));
    }
    Ok(Arc::new(model))
}

pub(crate) fn read_hidden_size(raw_config: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(raw_config)?;
    value.get("hidden_size").and_then(|v| v.as_u64()).map(|v| v as usize).ok_or_else(|| anyhow!("config.json has no hidden_size"))
}

/// Prefers `model.safetensors`, falls back to `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!(path = %safetensors.display(), "mmap safetensors");
        // SAFETY: the weights file is not modified while the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path).with_context(|| format!("reading {}", weights_path.display()))?;
    let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}
