use docqa_core::traits::LexicalIndex;
use docqa_core::types::{Document, DocumentMeta};
use docqa_text::tantivy_utils::parse_language;
use docqa_text::{TantivyIndexer, TantivyLexicalIndex};
use tantivy::tokenizer::Language;
use tempfile::TempDir;

fn corpus() -> Vec<Document> {
    let doc = |id: &str, page: u32, text: &str| {
        let mut meta = DocumentMeta::new("plant.pdf", page);
        meta.section = "2.1 Filtration".into();
        meta.flags.insert("has_percentage".into(), text.contains('%').to_string());
        Document::new(id, text, meta)
    };
    vec![
        doc("c1", 3, "The filter cake is washed with hot water before discharge."),
        doc("c2", 7, "Phosphoric acid concentration after filtration reaches 42% P2O5."),
        doc("c3", 9, "Crystallisation temperature is held at 80 degrees."),
    ]
}

#[tokio::test]
async fn tantivy_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    let indexer = TantivyIndexer::create(index_dir.clone(), Language::English).expect("indexer");
    assert_eq!(indexer.index(&corpus()).expect("index"), 3);

    let engine = TantivyLexicalIndex::open(&index_dir, Language::English).expect("engine");
    let hits = engine.search("phosphoric acid concentration", 10).await.expect("search");
    assert!(!hits.is_empty());
    let top = &hits[0];
    assert_eq!(top.chunk_id, "c2");
    assert_eq!(top.metadata.source, "plant.pdf");
    assert_eq!(top.metadata.page, 7);
    assert_eq!(top.metadata.section, "2.1 Filtration");
    assert_eq!(top.metadata.flags.get("has_percentage").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn stemming_matches_inflected_terms() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    TantivyIndexer::create(index_dir.clone(), Language::English).expect("indexer").index(&corpus()).expect("index");
    let engine = TantivyLexicalIndex::open(&index_dir, Language::English).expect("engine");
    let hits = engine.search("washing filters", 5).await.expect("search");
    assert_eq!(hits.first().map(|d| d.chunk_id.as_str()), Some("c1"));
}

#[tokio::test]
async fn query_syntax_characters_do_not_fail() {
    let tmp = TempDir::new().expect("tmp");
    let index_dir = tmp.path().join("lexical");
    TantivyIndexer::create(index_dir.clone(), Language::English).expect("indexer").index(&corpus()).expect("index");
    let engine = TantivyLexicalIndex::open(&index_dir, Language::English).expect("engine");
    assert!(engine.search("what is the \"temperature: (crystallisation?", 5).await.is_ok());
    assert!(engine.search("temperature", 0).await.expect("k=0").is_empty());
}

#[test]
fn missing_index_is_absent_not_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let opened = TantivyLexicalIndex::open_if_exists(&tmp.path().join("nope"), Language::French).expect("open");
    assert!(opened.is_none());
}

#[test]
fn language_names() {
    assert!(matches!(parse_language("French"), Ok(Language::French)));
    assert!(matches!(parse_language("en"), Ok(Language::English)));
    assert!(parse_language("klingon").is_err());
}
