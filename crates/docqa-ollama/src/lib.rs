//! Streaming chat completions against a local Ollama server.

mod chat;
mod decode;

pub use chat::{compose_system_prompt, OllamaGenerator};
pub use decode::decode_chat_stream;
