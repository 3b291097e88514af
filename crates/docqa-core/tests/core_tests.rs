use std::fs;
use std::io::Write;
use tempfile::TempDir;

use docqa_core::data_processor::{is_section_header, ChunkingConfig, DataProcessor};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("manual.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(dir).expect("process");

    assert_eq!(chunks.len(), 1, "one small page becomes one chunk");
    assert_eq!(chunks[0].content.trim(), "Short text");
    assert_eq!(chunks[0].metadata.source, "manual.pdf");
    assert_eq!(chunks[0].metadata.page, 1);
    assert_eq!(chunks[0].chunk_id.len(), 32);
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor
        .process_directory_limited(dir, 1)
        .expect("process limited");

    let mut sources = std::collections::HashSet::new();
    for c in &chunks { sources.insert(c.metadata.source.clone()); }
    assert_eq!(sources.len(), 1, "limited to one source document");
}

#[test]
fn form_feed_starts_a_new_page() {
    let processor = DataProcessor::new();
    let docs = processor.chunk_document("doc.pdf", "first page\x0csecond page\x0c\x0cfourth page");
    let pages: Vec<u32> = docs.iter().map(|d| d.metadata.page).collect();
    assert_eq!(pages, vec![1, 2, 4]);
}

#[test]
fn sections_carry_over_pages() {
    let processor = DataProcessor::new();
    let docs = processor.chunk_document("doc.pdf", "preface text\x0c2.1 Filtration\nthe filter cake\x0cwashing water");
    assert_eq!(docs[0].metadata.section, "Introduction");
    assert_eq!(docs[1].metadata.section, "2.1 Filtration");
    assert_eq!(docs[2].metadata.section, "2.1 Filtration");
}

#[test]
fn long_pages_split_with_bounded_chunks() {
    let processor = DataProcessor::with_config(ChunkingConfig { max_chars: 100, overlap_chars: 20 });
    let page: String = (0..20).map(|i| format!("Step {i}: the slurry is pumped to filter {i}. ")).collect();
    let docs = processor.chunk_document("doc.pdf", &page);
    assert!(docs.len() > 1);
    for d in &docs { assert!(d.content.chars().count() <= 100, "chunk too long: {}", d.content.len()); }
    let ids: std::collections::HashSet<_> = docs.iter().map(|d| d.chunk_id.clone()).collect();
    assert_eq!(ids.len(), docs.len(), "chunk ids are unique");
}

#[test]
fn chunk_ids_are_stable_across_runs() {
    let processor = DataProcessor::new();
    let a = processor.chunk_document("doc.pdf", "P2O5 concentration is 42%");
    let b = processor.chunk_document("doc.pdf", "P2O5 concentration is 42%");
    assert_eq!(a[0].chunk_id, b[0].chunk_id);
    assert_eq!(a[0].metadata.flags.get("has_percentage").map(String::as_str), Some("true"));
    assert_eq!(a[0].metadata.flags.get("word_count").map(String::as_str), Some("4"));
}

#[test]
fn section_header_detection() {
    assert!(is_section_header("3.2 Crystallisation"));
    assert!(is_section_header("FILTRATION UNIT"));
    assert!(!is_section_header("3.2"));
    assert!(!is_section_header("The filter runs at 80 °C."));
}
