//! Text ingestion: page-aware chunking with ingestion-assigned chunk ids.
//!
//! Input files are plain text extracted upstream from PDFs, one form feed
//! (`\x0c`) between pages. Layout extraction itself happens elsewhere.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{Document, DocumentMeta};

const PAGE_BREAK: char = '\x0c';
const DEFAULT_SECTION: &str = "Introduction";

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 800, overlap_chars: 150 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        self.process_files(data_dir, None)
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Document>> {
        self.process_files(data_dir, Some(limit))
    }

    fn process_files(&self, data_dir: &Path, limit: Option<usize>) -> Result<Vec<Document>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if let Some(limit) = limit {
            if files.len() > limit { files.truncate(limit); info!(limit, "limited to first files"); }
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, total = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let source = self.extract_source(file_path);
            all_chunks.extend(self.chunk_document(&source, &content));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "ingestion complete");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_source(&self, file_path: &Path) -> String {
        let stem = file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "unknown".into());
        format!("{stem}.pdf")
    }

    /// Split one extracted document into chunks, tracking page and section.
    pub fn chunk_document(&self, source: &str, content: &str) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut section = DEFAULT_SECTION.to_string();
        for (page_index, page_text) in content.split(PAGE_BREAK).enumerate() {
            let page = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
            for piece in self.split_with_overlap(page_text) {
                let headers: Vec<&str> = piece.lines().map(str::trim).filter(|l| is_section_header(l)).collect();
                let chunk_section = headers.first().map_or_else(|| section.clone(), |h| (*h).to_string());
                if let Some(last) = headers.last() { section = (*last).to_string(); }
                let mut meta = DocumentMeta::new(source, page);
                meta.section = chunk_section;
                meta.flags = content_flags(&piece);
                documents.push(Document::with_content_id(piece, meta));
            }
        }
        documents
    }

    /// Chunks of at most `max_chars` characters, overlapping by roughly
    /// `overlap_chars`, cut at the strongest separator available.
    fn split_with_overlap(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() { return vec![]; }
        let chars: Vec<char> = text.chars().collect();
        let max = self.chunking_config.max_chars.max(1);
        let overlap = self.chunking_config.overlap_chars.min(max / 2);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let hard_end = (start + max).min(chars.len());
            let end = if hard_end == chars.len() { hard_end } else { best_cut(&chars[start..hard_end]).map_or(hard_end, |cut| start + cut) };
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() { chunks.push(piece.to_string()); }
            if end >= chars.len() { break; }
            start = if end - start > overlap { end - overlap } else { end };
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

const SEPARATORS: [&str; 6] = ["\n\n\n", "\n\n", "\n", ". ", ";", ","];

/// Position just after the last strong separator in the second half of `window`.
fn best_cut(window: &[char]) -> Option<usize> {
    let s: String = window.iter().collect();
    let half = window.len() / 2;
    for sep in SEPARATORS {
        if let Some(byte_pos) = s.rfind(sep) {
            let cut = s[..byte_pos].chars().count() + sep.chars().count();
            if cut > half { return Some(cut); }
        }
    }
    None
}

/// Numbered headings (`2.1 Filtration`) or short all-caps lines.
pub fn is_section_header(line: &str) -> bool {
    let line = line.trim();
    if line.len() < 3 || line.len() > 80 { return false; }
    let mut parts = line.splitn(2, ' ');
    let (head, rest) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
    let numbered = !head.is_empty()
        && head.chars().all(|c| c.is_ascii_digit() || c == '.')
        && head.chars().next().is_some_and(|c| c.is_ascii_digit())
        && rest.chars().next().is_some_and(char::is_alphabetic);
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase());
    numbered || all_caps
}

/// Flags stored alongside each chunk; values are strings so every index can carry them.
pub fn content_flags(text: &str) -> crate::types::Meta {
    let mut flags = crate::types::Meta::new();
    flags.insert("has_percentage".into(), text.contains('%').to_string());
    flags.insert("has_temperature".into(), (text.contains("°C") || text.contains("° C") || text.contains("°F")).to_string());
    flags.insert("has_equation".into(), (text.contains('→') || text.contains('=')).to_string());
    flags.insert("word_count".into(), text.split_whitespace().count().to_string());
    flags.insert("char_count".into(), text.chars().count().to_string());
    flags
}
