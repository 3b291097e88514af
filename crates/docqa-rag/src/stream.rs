use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use docqa_core::error::GenerationError;
use docqa_core::traits::{Generator, TokenStream};

use crate::context::AssembledContext;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Metadata(AssembledContext),
    Token(String),
    Error(String),
}

pub type EventStream = BoxStream<'static, StreamEvent>;

pub const NOT_READY_MESSAGE: &str = "RAG Engine not ready.";

/// Sequences the answer: one `Metadata`, then tokens in arrival order, then
/// optionally one `Error`. Dropping the returned stream drops the generation
/// call with it.
pub struct StreamOrchestrator {
    generator: Arc<dyn Generator>,
    preamble: Arc<str>,
}

enum Phase {
    Start { context: AssembledContext, question: String },
    Connect { context_text: String, question: String },
    Streaming { tokens: TokenStream, emitted: usize },
    Done,
}

impl StreamOrchestrator {
    pub fn new(generator: Arc<dyn Generator>, preamble: impl Into<Arc<str>>) -> Self {
        Self { generator, preamble: preamble.into() }
    }

    pub fn stream(&self, question: String, context: AssembledContext) -> EventStream {
        let generator = Arc::clone(&self.generator);
        let preamble = Arc::clone(&self.preamble);
        stream::unfold(Phase::Start { context, question }, move |phase| {
            let generator = Arc::clone(&generator);
            let preamble = Arc::clone(&preamble);
            async move { step(phase, generator.as_ref(), &preamble).await }
        })
        .boxed()
    }

    /// The single-event stream returned when no engine is available.
    pub fn not_ready() -> EventStream {
        stream::iter([StreamEvent::Error(NOT_READY_MESSAGE.to_string())]).boxed()
    }
}

fn generation_failed(e: &GenerationError) -> StreamEvent {
    StreamEvent::Error(format!("LLM generation failed: {e}"))
}

async fn step(mut phase: Phase, generator: &dyn Generator, preamble: &str) -> Option<(StreamEvent, Phase)> {
    loop {
        match phase {
            Phase::Start { context, question } => {
                let context_text = context.text.clone();
                return Some((StreamEvent::Metadata(context), Phase::Connect { context_text, question }));
            }
            Phase::Connect { context_text, question } => match generator.stream_completion(preamble, &context_text, &question).await {
                Ok(tokens) => phase = Phase::Streaming { tokens, emitted: 0 },
                Err(e) => {
                    warn!(error = %e, "generation request failed");
                    return Some((generation_failed(&e), Phase::Done));
                }
            },
            Phase::Streaming { mut tokens, emitted } => {
                let next = tokens.next().await;
                match next {
                    Some(Ok(token)) if token.is_empty() => phase = Phase::Streaming { tokens, emitted },
                    Some(Ok(token)) => return Some((StreamEvent::Token(token), Phase::Streaming { tokens, emitted: emitted + 1 })),
                    Some(Err(e)) => {
                        warn!(error = %e, emitted, "generation failed mid-stream");
                        return Some((generation_failed(&e), Phase::Done));
                    }
                    None => {
                        debug!(emitted, "generation finished");
                        return None;
                    }
                }
            }
            Phase::Done => return None,
        }
    }
}
