//! Byte-stream framing of [`StreamEvent`]s for transports that carry plain text.
//!
//! ```text
//! METADATA_START:{"sources":[...],"context":"..."}:METADATA_END\n\n
//! <token><token>...
//! SYSTEM_ERROR: <message>
//! ```

use futures::stream::{BoxStream, StreamExt};

use crate::stream::{EventStream, StreamEvent};

pub const METADATA_START: &str = "METADATA_START:";
pub const METADATA_END: &str = ":METADATA_END\n\n";
pub const ERROR_PREFIX: &str = "SYSTEM_ERROR: ";

pub fn encode(event: &StreamEvent) -> Result<String, serde_json::Error> {
    Ok(match event {
        StreamEvent::Metadata(ctx) => format!("{METADATA_START}{}{METADATA_END}", serde_json::to_string(ctx)?),
        StreamEvent::Token(token) => token.clone(),
        StreamEvent::Error(message) => format!("{ERROR_PREFIX}{message}"),
    })
}

/// Frames every event; an unencodable metadata frame becomes an error frame.
pub fn encode_stream(events: EventStream) -> BoxStream<'static, String> {
    events
        .map(|event| encode(&event).unwrap_or_else(|e| format!("{ERROR_PREFIX}metadata encoding failed: {e}")))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AssembledContext;

    #[test]
    fn metadata_frame_is_byte_exact() {
        let ctx = AssembledContext { sources: vec!["doc.pdf (p.7)".into()], text: "Source: doc.pdf, Page: 7\n42%".into() };
        assert_eq!(
            encode(&StreamEvent::Metadata(ctx)).unwrap(),
            "METADATA_START:{\"sources\":[\"doc.pdf (p.7)\"],\"context\":\"Source: doc.pdf, Page: 7\\n42%\"}:METADATA_END\n\n"
        );
    }

    #[test]
    fn tokens_are_raw_and_errors_prefixed() {
        assert_eq!(encode(&StreamEvent::Token(" acid".into())).unwrap(), " acid");
        assert_eq!(encode(&StreamEvent::Error("RAG Engine not ready.".into())).unwrap(), "SYSTEM_ERROR: RAG Engine not ready.");
    }

    #[tokio::test]
    async fn whole_stream() {
        let events = futures::stream::iter(vec![
            StreamEvent::Metadata(AssembledContext::default()),
            StreamEvent::Token("Hi".into()),
            StreamEvent::Error("boom".into()),
        ])
        .boxed();
        let body: String = encode_stream(events).collect::<Vec<_>>().await.concat();
        assert_eq!(body, "METADATA_START:{\"sources\":[],\"context\":\"\"}:METADATA_END\n\nHiSYSTEM_ERROR: boom");
    }
}
