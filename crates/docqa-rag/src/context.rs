use serde::Serialize;

use docqa_core::types::Document;

pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Grounding text handed to the generator plus the citations it draws on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembledContext {
    /// `source (p.page)` labels, deduplicated, first occurrence wins.
    pub sources: Vec<String>,
    #[serde(rename = "context")]
    pub text: String,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.sources.is_empty()
    }
}

pub fn format_block(doc: &Document) -> String {
    format!("Source: {}, Page: {}\n{}", doc.metadata.source, doc.metadata.page, doc.content)
}

/// Builds the context from documents in their final order. Pure.
pub fn assemble<'a, I>(documents: I) -> AssembledContext
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut blocks = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    for doc in documents {
        blocks.push(format_block(doc));
        let citation = doc.metadata.citation();
        if !sources.contains(&citation) {
            sources.push(citation);
        }
    }
    AssembledContext { sources, text: blocks.join(BLOCK_SEPARATOR) }
}
