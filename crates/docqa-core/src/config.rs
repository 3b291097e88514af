//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`, e.g. `APP_RETRIEVAL__K_FINAL`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::InitError;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self::from_figment(figment))
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed settings, validated.
    pub fn settings(&self) -> Result<Settings, InitError> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| InitError::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub data: DataSettings,
    pub models: ModelSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), InitError> {
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k_lexical: usize,
    pub k_semantic: usize,
    pub k_diversity: usize,
    /// Candidate pool for diversity search is `k_diversity * diversity_fetch_factor`.
    pub diversity_fetch_factor: usize,
    pub diversity_lambda: f32,
    pub rrf_k: u32,
    /// Fused candidates handed to the relevance scorer.
    pub rerank_window: usize,
    pub k_final: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k_lexical: 20,
            k_semantic: 20,
            k_diversity: 20,
            diversity_fetch_factor: 2,
            diversity_lambda: 0.5,
            rrf_k: 60,
            rerank_window: 20,
            k_final: 6,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), InitError> {
        if self.rrf_k == 0 {
            return Err(InitError::InvalidConfig("retrieval.rrf_k must be > 0".into()));
        }
        if self.k_final == 0 {
            return Err(InitError::InvalidConfig("retrieval.k_final must be > 0".into()));
        }
        if self.diversity_fetch_factor == 0 {
            return Err(InitError::InvalidConfig("retrieval.diversity_fetch_factor must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.diversity_lambda) {
            return Err(InitError::InvalidConfig(format!(
                "retrieval.diversity_lambda must be within [0, 1], got {}",
                self.diversity_lambda
            )));
        }
        Ok(())
    }

    pub fn diversity_fetch_k(&self) -> usize {
        self.k_diversity.saturating_mul(self.diversity_fetch_factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_txt_dir: String,
    pub lancedb_dir: String,
    pub table: String,
    pub tantivy_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            raw_txt_dir: "data/raw".into(),
            lancedb_dir: "vectorstore".into(),
            table: "documents".into(),
            tantivy_dir: "vectorstore/lexical".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedding_dir: String,
    /// No directory means no reranking; fused order is kept.
    pub reranker_dir: Option<String>,
    pub query_prefix: String,
    pub passage_prefix: String,
    pub embedding_dim: usize,
    pub use_fake_embeddings: bool,
    pub lexical_language: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedding_dir: "models/multilingual-e5-large".into(),
            reranker_dir: Some("models/ms-marco-MiniLM-L-6-v2".into()),
            query_prefix: "query: ".into(),
            passage_prefix: "passage: ".into(),
            embedding_dim: 1024,
            use_fake_embeddings: false,
            lexical_language: "french".into(),
        }
    }
}

pub const DEFAULT_PREAMBLE: &str = "You are a technical assistant for the documents in this corpus.

RULES:
1. For technical questions, answer ONLY from the CONTEXT below and ALWAYS cite the exact sources (document + page).
2. For greetings or general questions, answer naturally and politely.
3. If the context holds partial or related information, share it and say what is missing.
4. If the context holds nothing relevant to a technical question, say so politely without inventing figures or details.
5. Be professional and precise.

DOCUMENT CONTEXT:
{context}
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub preamble: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "qwen2.5:14b-instruct-q4_K_M".into(),
            temperature: 0.0,
            num_ctx: 4096,
            top_p: 0.95,
            repeat_penalty: 1.1,
            preamble: DEFAULT_PREAMBLE.into(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
