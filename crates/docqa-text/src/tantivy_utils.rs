use anyhow::{anyhow, Result};
use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{AsciiFoldingFilter, Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ANALYZER: &str = "docqa_text";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("chunk_id", STRING | STORED);
	schema_builder.add_text_field("source", STRING | STORED);
	schema_builder.add_u64_field("page", STORED);
	schema_builder.add_text_field("section", STORED);
	schema_builder.add_text_field("meta", STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn parse_language(name: &str) -> Result<Language> {
	match name.to_ascii_lowercase().as_str() {
		"french" | "fr" => Ok(Language::French),
		"english" | "en" => Ok(Language::English),
		"german" | "de" => Ok(Language::German),
		"spanish" | "es" => Ok(Language::Spanish),
		"italian" | "it" => Ok(Language::Italian),
		"dutch" | "nl" => Ok(Language::Dutch),
		"portuguese" | "pt" => Ok(Language::Portuguese),
		other => Err(anyhow!("unsupported lexical language '{}'", other)),
	}
}

/// Lowercase, fold accents, drop stop words, stem. Must be registered on
/// every `Index` handle before writing or parsing queries.
pub fn register_tokenizer(index: &Index, language: Language) {
	let stop_words = StopWordFilter::new(language).unwrap_or_else(|| StopWordFilter::remove(Vec::<String>::new()));
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(stop_words)
		.filter(AsciiFoldingFilter)
		.filter(Stemmer::new(language))
		.build();
	index.tokenizers().register(ANALYZER, tokenizer);
}
