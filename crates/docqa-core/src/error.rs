use thiserror::Error;

/// A retrieval capability failed for one query.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search failed: {0}")]
    Search(String),
}

/// The relevance scorer could not produce scores.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("relevance scorer unavailable: {0}")]
    Unavailable(String),

    #[error("scoring failed: {0}")]
    Inference(String),

    #[error("scorer returned {got} scores for {expected} documents")]
    Arity { expected: usize, got: usize },
}

/// The generation backend failed before or during streaming.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend unreachable: {0}")]
    Connect(String),

    #[error("generation backend returned HTTP {0}")]
    Status(u16),

    #[error("generation backend error: {0}")]
    Backend(String),

    #[error("generation stream interrupted: {0}")]
    Stream(String),

    #[error("malformed generation frame: {0}")]
    Decode(String),
}

/// The engine could not be constructed. Fatal for that engine instance.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load {component}: {reason}")]
    Load { component: &'static str, reason: String },
}

impl InitError {
    pub fn load(component: &'static str, err: impl std::fmt::Display) -> Self {
        InitError::Load { component, reason: err.to_string() }
    }
}
