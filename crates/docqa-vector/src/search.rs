use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use docqa_core::error::IndexError;
use docqa_core::traits::{Embedder, EmbeddingIndex};
use docqa_core::types::{Document, DocumentMeta, Meta};
use docqa_embed::embed_prefixed;

use crate::mmr::{mmr_select, MmrCandidate};
use crate::table::{open_db, table_exists};

pub struct LanceEmbeddingIndex { db: Connection, table_name: String, embedder: Arc<dyn Embedder>, query_prefix: String, lambda: f32 }

impl LanceEmbeddingIndex {
	/// Fails when the table has never been written.
	pub async fn open(db_path: &Path, table_name: &str, embedder: Arc<dyn Embedder>, query_prefix: &str, lambda: f32) -> Result<Self> {
		let db = open_db(db_path).await?;
		if !table_exists(&db, table_name).await? {
			return Err(anyhow!("LanceDB table '{}' not found under {}", table_name, db_path.display()));
		}
		Ok(Self { db, table_name: table_name.to_string(), embedder, query_prefix: query_prefix.to_string(), lambda })
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let embedder = Arc::clone(&self.embedder);
		let prefix = self.query_prefix.clone();
		let texts = vec![query.to_string()];
		let mut out = tokio::task::spawn_blocking(move || embed_prefixed(embedder.as_ref(), &prefix, &texts)).await??;
		out.pop().ok_or_else(|| anyhow!("embedder returned no vector"))
	}

	async fn table(&self) -> Result<Table> { Ok(self.db.open_table(&self.table_name).execute().await?) }

	/// Nearest rows to `query_vec`, best first, with their stored vectors.
	async fn nearest(&self, query_vec: Vec<f32>, limit: usize) -> Result<Vec<(Document, Vec<f32>)>> {
		let table = self.table().await?;
		let mut results = table.vector_search(query_vec)?.limit(limit).execute().await?;
		let mut rows = Vec::new();
		while let Some(batch) = TryStreamExt::try_next(&mut results).await? { rows.extend(rows_from_batch(&batch)?); }
		rows.truncate(limit);
		Ok(rows)
	}

	pub async fn semantic_documents(&self, query: &str, k: usize) -> Result<Vec<Document>> {
		if k == 0 { return Ok(vec![]); }
		let q = self.embed_query(query).await?;
		let rows = self.nearest(q, k).await?;
		debug!(hits = rows.len(), k, "semantic search");
		Ok(rows.into_iter().map(|(d, _)| d).collect())
	}

	pub async fn diversity_documents(&self, query: &str, k: usize, fetch_k: usize) -> Result<Vec<Document>> {
		if k == 0 { return Ok(vec![]); }
		let q = self.embed_query(query).await?;
		let rows = self.nearest(q.clone(), fetch_k.max(k)).await?;
		let fetched = rows.len();
		let candidates = rows.into_iter().map(|(item, vector)| MmrCandidate { item, vector }).collect();
		let picked = mmr_select(&q, candidates, k, self.lambda);
		debug!(fetched, picked = picked.len(), lambda = self.lambda, "diversity search");
		Ok(picked)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{} column missing", name))
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<(Document, Vec<f32>)>> {
	let ids = string_column(batch, "chunk_id")?;
	let sources = string_column(batch, "source")?;
	let sections = string_column(batch, "section")?;
	let contents = string_column(batch, "content")?;
	let metas = string_column(batch, "meta")?;
	let pages = batch.column_by_name("page").and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("page column missing"))?;
	let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("vector column missing"))?;
	let mut rows = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let raw_meta = metas.value(i);
		let flags: Meta = if raw_meta.is_empty() { Meta::new() } else { serde_json::from_str(raw_meta)? };
		let metadata = DocumentMeta {
			source: sources.value(i).to_string(),
			page: u32::try_from(pages.value(i)).unwrap_or(0),
			section: sections.value(i).to_string(),
			flags,
		};
		let list = vectors.value(i);
		let vector: Vec<f32> = list.as_primitive::<arrow_array::types::Float32Type>().values().iter().copied().collect();
		rows.push((Document::new(ids.value(i), contents.value(i), metadata), vector));
	}
	Ok(rows)
}

#[async_trait]
impl EmbeddingIndex for LanceEmbeddingIndex {
	async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<Document>, IndexError> {
		self.semantic_documents(query, k).await.map_err(|e| IndexError::Search(e.to_string()))
	}

	async fn diversity_search(&self, query: &str, k: usize, fetch_k: usize) -> Result<Vec<Document>, IndexError> {
		self.diversity_documents(query, k, fetch_k).await.map_err(|e| IndexError::Search(e.to_string()))
	}
}
