use anyhow::Result;
use std::path::PathBuf;
use tantivy::schema::Field;
use tantivy::tokenizer::Language;
use tantivy::{doc, Index, IndexWriter};
use tracing::info;

use docqa_core::types::Document;

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// Writes chunks into a fresh Tantivy index directory.
pub struct TantivyIndexer {
	index: Index,
	chunk_id_field: Field,
	source_field: Field,
	page_field: Field,
	section_field: Field,
	meta_field: Field,
	text_field: Field,
}

impl TantivyIndexer {
	/// Creates the index, replacing whatever was in `index_dir`.
	pub fn create(index_dir: PathBuf, language: Language) -> Result<Self> {
		let schema = build_schema();
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		let index = Index::create_in_dir(&index_dir, schema.clone())?;
		register_tokenizer(&index, language);
		Ok(Self {
			index,
			chunk_id_field: schema.get_field("chunk_id")?,
			source_field: schema.get_field("source")?,
			page_field: schema.get_field("page")?,
			section_field: schema.get_field("section")?,
			meta_field: schema.get_field("meta")?,
			text_field: schema.get_field("text")?,
		})
	}

	pub fn index(&self, documents: &[Document]) -> Result<usize> {
		let mut index_writer: IndexWriter = self.index.writer(50_000_000)?;
		for d in documents {
			let meta = serde_json::to_string(&d.metadata.flags)?;
			index_writer.add_document(doc!(
				self.chunk_id_field => d.chunk_id.clone(),
				self.source_field => d.metadata.source.clone(),
				self.page_field => u64::from(d.metadata.page),
				self.section_field => d.metadata.section.clone(),
				self.meta_field => meta,
				self.text_field => d.content.clone(),
			))?;
		}
		index_writer.commit()?;
		info!(documents = documents.len(), "lexical index committed");
		Ok(documents.len())
	}
}
