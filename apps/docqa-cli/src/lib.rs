//! Wiring shared by the binaries: logging setup, settings and engine bootstrap.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docqa_core::config::{expand_path, Config, GenerationSettings, Settings};
use docqa_core::error::InitError;
use docqa_core::traits::{LexicalIndex, RelevanceScorer};
use docqa_embed::{load_embedder, select_device, CrossEncoderScorer};
use docqa_ollama::OllamaGenerator;
use docqa_rag::{AnswerService, EngineParts, RagEngine};
use docqa_text::tantivy_utils::parse_language;
use docqa_text::TantivyLexicalIndex;
use docqa_vector::LanceEmbeddingIndex;

/// Logs go to stderr; stdout carries only command output.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub fn load_settings() -> Result<Settings, InitError> {
    Config::load().map_err(|e| InitError::InvalidConfig(e.to_string()))?.settings()
}

/// Opens every collaborator named in `settings`. A missing lexical index only
/// disables that strategy; anything else that fails to load is fatal.
pub async fn build_engine(settings: &Settings) -> Result<RagEngine, InitError> {
    let language = parse_language(&settings.models.lexical_language).map_err(|e| InitError::InvalidConfig(e.to_string()))?;
    let embedder = load_embedder(&settings.models).map_err(|e| InitError::load("embedding model", e))?;

    let lancedb_dir = expand_path(&settings.data.lancedb_dir);
    let embedding = LanceEmbeddingIndex::open(
        &lancedb_dir,
        &settings.data.table,
        embedder,
        &settings.models.query_prefix,
        settings.retrieval.diversity_lambda,
    )
    .await
    .map_err(|e| InitError::load("vector store", e))?;

    let tantivy_dir = expand_path(&settings.data.tantivy_dir);
    let lexical: Option<Arc<dyn LexicalIndex>> = match TantivyLexicalIndex::open_if_exists(&tantivy_dir, language) {
        Ok(Some(index)) => Some(Arc::new(index)),
        Ok(None) => {
            info!(dir = %tantivy_dir.display(), "no lexical index, lexical strategy disabled");
            None
        }
        Err(e) => {
            warn!(dir = %tantivy_dir.display(), error = %e, "lexical index failed to open, lexical strategy disabled");
            None
        }
    };

    let scorer: Option<Arc<dyn RelevanceScorer>> = match &settings.models.reranker_dir {
        Some(dir) => {
            let scorer = CrossEncoderScorer::load(&expand_path(dir), select_device()).map_err(|e| InitError::load("reranker", e))?;
            Some(Arc::new(scorer))
        }
        None => None,
    };

    let parts = EngineParts {
        embedding: Arc::new(embedding),
        lexical,
        scorer,
        generator: Arc::new(OllamaGenerator::new(&settings.generation)),
        preamble: settings.generation.preamble.clone(),
    };
    RagEngine::new(parts, settings.retrieval.clone())
}

/// Startup result wrapped for answering; never fails itself.
pub async fn build_service() -> AnswerService {
    let engine = match load_settings() {
        Ok(settings) => build_engine(&settings).await,
        Err(e) => Err(e),
    };
    AnswerService::new(engine)
}

/// Whether the configured Ollama server answers. Logged with the model name.
pub async fn generation_backend_reachable(settings: &GenerationSettings) -> bool {
    let generator = OllamaGenerator::new(settings);
    let reachable = generator.health_check().await;
    info!(model = generator.model(), reachable, "generation backend checked");
    reachable
}

/// Writes frames as they arrive, flushing after each. Nothing is added
/// between or after frames.
pub async fn write_frames<W: Write>(mut frames: BoxStream<'static, String>, out: &mut W) -> std::io::Result<()> {
    while let Some(frame) = frames.next().await {
        out.write_all(frame.as_bytes())?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::config::Settings;

    #[tokio::test]
    async fn missing_vector_store_is_an_init_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.models.use_fake_embeddings = true;
        settings.models.reranker_dir = None;
        settings.data.lancedb_dir = tmp.path().join("vectorstore").to_string_lossy().into_owned();
        settings.data.tantivy_dir = tmp.path().join("lexical").to_string_lossy().into_owned();
        let err = build_engine(&settings).await.err().expect("init error");
        assert!(matches!(err, InitError::Load { component: "vector store", .. }));
        assert!(!AnswerService::new(Err(err)).is_ready());
    }

    #[tokio::test]
    async fn unreachable_generation_backend_is_reported() {
        let settings = GenerationSettings { base_url: "http://127.0.0.1:1".into(), ..GenerationSettings::default() };
        assert!(!generation_backend_reachable(&settings).await);
    }

    #[tokio::test]
    async fn stdout_carries_exactly_the_wire_stream() {
        let service = AnswerService::new(Err(InitError::InvalidConfig("rrf_k must be > 0".into())));
        let mut out: Vec<u8> = Vec::new();
        write_frames(docqa_rag::wire::encode_stream(service.stream_answer("q", 0)), &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "SYSTEM_ERROR: RAG Engine not ready.");
    }

    #[tokio::test]
    async fn unknown_language_is_invalid_config() {
        let mut settings = Settings::default();
        settings.models.lexical_language = "klingon".into();
        assert!(matches!(build_engine(&settings).await, Err(InitError::InvalidConfig(_))));
    }
}
