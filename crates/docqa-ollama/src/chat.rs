use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use docqa_core::config::GenerationSettings;
use docqa_core::error::GenerationError;
use docqa_core::traits::{Generator, TokenStream};

use crate::decode::decode_chat_stream;

/// Ollama `/api/chat` client. Requests are streamed; nothing is buffered.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: ChatOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_ctx: u32,
    top_p: f32,
    repeat_penalty: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: &'a ChatOptions,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            options: ChatOptions {
                temperature: settings.temperature,
                num_ctx: settings.num_ctx,
                top_p: settings.top_p,
                repeat_penalty: settings.repeat_penalty,
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the server answers `/api/tags`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(model = %self.model, "Ollama health check passed");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Ollama unreachable");
                false
            }
        }
    }
}

/// Substitutes `{context}` in the preamble, or appends the context when the
/// placeholder is absent.
pub fn compose_system_prompt(preamble: &str, context: &str) -> String {
    if preamble.contains("{context}") {
        preamble.replace("{context}", context)
    } else {
        format!("{preamble}\n\nContext:\n{context}")
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn stream_completion(&self, preamble: &str, context: &str, question: &str) -> Result<TokenStream, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);
        let system = compose_system_prompt(preamble, context);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &system },
                ChatMessage { role: "user", content: question },
            ],
            stream: true,
            options: &self.options,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Ollama chat request rejected");
            return Err(GenerationError::Status(status.as_u16()));
        }

        debug!(model = %self.model, "streaming chat completion");
        Ok(decode_chat_stream(response.bytes_stream()).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_substituted() {
        assert_eq!(compose_system_prompt("Use this:\n{context}\nBe brief.", "CTX"), "Use this:\nCTX\nBe brief.");
    }

    #[test]
    fn context_is_appended_without_placeholder() {
        assert_eq!(compose_system_prompt("Be brief.", "CTX"), "Be brief.\n\nContext:\nCTX");
    }

    #[test]
    fn request_body_shape() {
        let options = ChatOptions { temperature: 0.0, num_ctx: 4096, top_p: 0.95, repeat_penalty: 1.1 };
        let body = serde_json::to_value(ChatRequest {
            model: "m",
            messages: vec![ChatMessage { role: "system", content: "s" }, ChatMessage { role: "user", content: "q" }],
            stream: true,
            options: &options,
        })
        .unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["options"]["num_ctx"], 4096);
    }
}
