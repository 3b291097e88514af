use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;

use docqa_core::error::GenerationError;

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

struct DecodeState<B, E> {
    inner: BoxStream<'static, Result<B, E>>,
    buf: Vec<u8>,
    pending: VecDeque<Result<String, GenerationError>>,
    finished: bool,
}

impl<B, E> DecodeState<B, E> {
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else { break };
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match serde_json::from_str::<ChatChunk>(text) {
            Ok(ChatChunk { error: Some(err), .. }) => {
                self.pending.push_back(Err(GenerationError::Backend(err)));
                self.finished = true;
            }
            Ok(chunk) => {
                if let Some(msg) = chunk.message {
                    if !msg.content.is_empty() {
                        self.pending.push_back(Ok(msg.content));
                    }
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => {
                self.pending.push_back(Err(GenerationError::Decode(e.to_string())));
                self.finished = true;
            }
        }
    }
}

/// Turns Ollama's newline-delimited JSON body into a token stream.
///
/// Empty deltas are skipped. The stream ends after `done: true` or after the
/// first error, whichever comes first.
pub fn decode_chat_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String, GenerationError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState { inner: body.boxed(), buf: Vec::new(), pending: VecDeque::new(), finished: false };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buf.extend_from_slice(bytes.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(GenerationError::Stream(e.to_string())));
                    st.finished = true;
                }
                None => {
                    let rest = std::mem::take(&mut st.buf);
                    st.handle_line(&rest);
                    st.finished = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, String>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    async fn collect(s: impl Stream<Item = Result<String, GenerationError>>) -> Vec<Result<String, GenerationError>> {
        s.collect().await
    }

    #[tokio::test]
    async fn tokens_in_order_and_empty_skipped() {
        let out = collect(decode_chat_stream(body(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":false}\n{\"message\":{\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ])))
        .await;
        let tokens: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(tokens, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let out = collect(decode_chat_stream(body(&["{\"message\":{\"con", "tent\":\"A\"}}\n{\"message\":{\"content\":\"B\"},\"done\":true}"]))).await;
        let tokens: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(tokens, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn nothing_after_done() {
        let out = collect(decode_chat_stream(body(&[
            "{\"message\":{\"content\":\"A\"},\"done\":true}\n{\"message\":{\"content\":\"late\"}}\n",
        ])))
        .await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn backend_error_terminates_after_prior_tokens() {
        let out = collect(decode_chat_stream(body(&[
            "{\"message\":{\"content\":\"A\"}}\n{\"error\":\"model not found\"}\n{\"message\":{\"content\":\"B\"}}\n",
        ])))
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "A");
        assert!(matches!(&out[1], Err(GenerationError::Backend(m)) if m == "model not found"));
    }

    #[tokio::test]
    async fn transport_error_terminates() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"{\"message\":{\"content\":\"A\"}}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"{\"message\":{\"content\":\"B\"}}\n".to_vec()),
        ];
        let out = collect(decode_chat_stream(stream::iter(parts))).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[1], Err(GenerationError::Stream(m)) if m.contains("reset")));
    }

    #[tokio::test]
    async fn malformed_line_is_a_decode_error() {
        let out = collect(decode_chat_stream(body(&["not json\n"]))).await;
        assert!(matches!(out.as_slice(), [Err(GenerationError::Decode(_))]));
    }
}
