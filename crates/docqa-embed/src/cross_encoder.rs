use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{linear, Linear};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, Tokenizer, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use docqa_core::error::ScoringError;
use docqa_core::traits::RelevanceScorer;
use docqa_core::types::Document;

use crate::{load_weights, read_hidden_size};

const MAX_PAIR_LEN: usize = 512;
const PAIR_BATCH: usize = 16;

struct CrossEncoder { bert: BertModel, pooler: Linear, classifier: Linear, tokenizer: Tokenizer, device: Device }

/// BERT sequence-pair classifier (ms-marco style). One logit per (query, passage).
pub struct CrossEncoderScorer { inner: Arc<CrossEncoder> }

impl CrossEncoderScorer {
    pub fn load(model_dir: &Path, device: Device) -> Result<Self> {
        info!(dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: MAX_PAIR_LEN, strategy: TruncationStrategy::OnlySecond, ..Default::default() }))
            .map_err(|e| anyhow!("truncation setup failed: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let hidden = read_hidden_size(&raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;
        Ok(Self { inner: Arc::new(CrossEncoder { bert, pooler, classifier, tokenizer, device }) })
    }
}

impl CrossEncoder {
    fn score_pairs(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for batch in passages.chunks(PAIR_BATCH) {
            let pairs: Vec<(&str, &str)> = batch.iter().map(|p| (query, p.as_str())).collect();
            let encodings = self.tokenizer.encode_batch(pairs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
            let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
            let (mut ids, mut types, mut mask) = (Vec::new(), Vec::new(), Vec::new());
            for enc in &encodings {
                ids.extend_from_slice(enc.get_ids());
                types.extend_from_slice(enc.get_type_ids());
                mask.extend_from_slice(enc.get_attention_mask());
            }
            let shape = (encodings.len(), seq_len);
            let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
            let token_type_ids = Tensor::from_vec(types, shape, &self.device)?;
            let attention_mask = Tensor::from_vec(mask, shape, &self.device)?;
            let hidden = self.bert.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
            let cls = hidden.i((.., 0))?;
            let pooled = self.pooler.forward(&cls)?.tanh()?;
            let logits = self.classifier.forward(&pooled)?.squeeze(1)?.to_dtype(DType::F32)?;
            scores.extend(logits.to_device(&Device::Cpu)?.to_vec1::<f32>()?);
        }
        debug!(pairs = passages.len(), "cross-encoder scored");
        Ok(scores)
    }
}

#[async_trait]
impl RelevanceScorer for CrossEncoderScorer {
    async fn score(&self, query: &str, documents: &[Document]) -> Result<Vec<f32>, ScoringError> {
        if documents.is_empty() { return Ok(vec![]); }
        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        let passages: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        tokio::task::spawn_blocking(move || inner.score_pairs(&query, &passages))
            .await
            .map_err(|e| ScoringError::Inference(e.to_string()))?
            .map_err(|e| ScoringError::Inference(e.to_string()))
    }
}
