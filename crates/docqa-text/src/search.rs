use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::tokenizer::Language;
use tantivy::{Index, IndexReader, TantivyDocument};
use tracing::debug;

use docqa_core::error::IndexError;
use docqa_core::traits::LexicalIndex;
use docqa_core::types::{Document, DocumentMeta, Meta};

pub struct TantivyLexicalIndex {
	index: Index,
	reader: IndexReader,
	chunk_id_field: Field,
	source_field: Field,
	page_field: Field,
	section_field: Field,
	meta_field: Field,
	text_field: Field,
}

impl TantivyLexicalIndex {
	pub fn open(index_dir: &Path, language: Language) -> Result<Self> {
		let index = Index::open_in_dir(index_dir)?;
		crate::tantivy_utils::register_tokenizer(&index, language);
		let reader = index.reader()?;
		let schema = index.schema();
		Ok(Self {
			chunk_id_field: schema.get_field("chunk_id")?,
			source_field: schema.get_field("source")?,
			page_field: schema.get_field("page")?,
			section_field: schema.get_field("section")?,
			meta_field: schema.get_field("meta")?,
			text_field: schema.get_field("text")?,
			index,
			reader,
		})
	}

	/// `None` when no index was ever built at `index_dir`.
	pub fn open_if_exists(index_dir: &Path, language: Language) -> Result<Option<Self>> {
		if !index_dir.join("meta.json").exists() { return Ok(None); }
		Self::open(index_dir, language).map(Some)
	}

	pub fn search_documents(&self, query_text: &str, limit: usize) -> Result<Vec<Document>> {
		if limit == 0 || query_text.trim().is_empty() { return Ok(vec![]); }
		let searcher = self.reader.searcher();
		let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (query, errors) = query_parser.parse_query_lenient(query_text);
		if !errors.is_empty() { debug!(errors = errors.len(), "lenient query parse dropped terms"); }
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;
		let mut results = Vec::with_capacity(top_docs.len());
		for (_score, address) in top_docs {
			let doc: TantivyDocument = searcher.doc(address)?;
			results.push(self.to_document(&doc)?);
		}
		Ok(results)
	}

	fn to_document(&self, doc: &TantivyDocument) -> Result<Document> {
		let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		let chunk_id = text(self.chunk_id_field);
		if chunk_id.is_empty() { anyhow::bail!("lexical hit without chunk_id"); }
		let page = doc.get_first(self.page_field).and_then(|v| v.as_u64()).unwrap_or(0);
		let flags: Meta = match doc.get_first(self.meta_field).and_then(|v| v.as_str()) {
			Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
			_ => Meta::new(),
		};
		let metadata = DocumentMeta {
			source: text(self.source_field),
			page: u32::try_from(page).unwrap_or(u32::MAX),
			section: text(self.section_field),
			flags,
		};
		Ok(Document::new(chunk_id, text(self.text_field), metadata))
	}
}

#[async_trait]
impl LexicalIndex for TantivyLexicalIndex {
	async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, IndexError> {
		self.search_documents(query, k).map_err(|e| IndexError::Search(e.to_string()))
	}
}
