use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use arrow_array::{RecordBatch, RecordBatchIterator, Int32Array, FixedSizeListArray, StringArray};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use docqa_core::traits::Embedder;
use docqa_core::types::Document;
use docqa_embed::embed_prefixed;

use crate::schema::build_arrow_schema;
use crate::table::{open_db, remove_table_dir, table_exists};

const INSERT_BATCH: usize = 1000;
const EMBED_BATCH: usize = 32;

pub struct LanceDbIndexer { db: Connection, db_path: PathBuf, table_name: String, dim: usize }

impl LanceDbIndexer {
	pub async fn new(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		std::fs::create_dir_all(db_path)?;
		let db = open_db(db_path).await?;
		Ok(Self { db, db_path: db_path.to_path_buf(), table_name: table_name.to_string(), dim })
	}

	/// Drops any previous contents of the table.
	pub fn reset(&self) -> Result<()> { remove_table_dir(&self.db_path, &self.table_name) }

	/// Embeds each chunk with `passage_prefix` and writes it.
	pub async fn index_chunks(&self, docs: &[Document], embedder: Arc<dyn Embedder>, passage_prefix: &str) -> Result<usize> {
		if docs.is_empty() { info!("no chunks to index"); return Ok(0); }
		ensure!(embedder.dim() == self.dim, "embedder produces {} dims, table expects {}", embedder.dim(), self.dim);
		let pb = progress_bar(docs.len(), "embedding")?;
		let mut embeddings = Vec::with_capacity(docs.len());
		for batch in docs.chunks(EMBED_BATCH) {
			let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
			let embedder = Arc::clone(&embedder);
			let prefix = passage_prefix.to_string();
			let vectors = tokio::task::spawn_blocking(move || embed_prefixed(embedder.as_ref(), &prefix, &texts)).await??;
			embeddings.extend(vectors);
			pb.inc(batch.len() as u64);
		}
		pb.finish_and_clear();
		self.index(docs, &embeddings).await
	}

	pub async fn index(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<usize> {
		if docs.is_empty() { return Ok(0); }
		ensure!(docs.len() == embeddings.len(), "{} chunks but {} embeddings", docs.len(), embeddings.len());
		info!(chunks = docs.len(), table = %self.table_name, "writing LanceDB table");
		let pb = progress_bar(docs.len(), "writing")?;
		for (doc_batch, emb_batch) in docs.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
			self.insert_batch(doc_batch, emb_batch).await?;
			pb.inc(doc_batch.len() as u64);
		}
		pb.finish_and_clear();
		info!(chunks = docs.len(), table = %self.table_name, "LanceDB indexing completed");
		Ok(docs.len())
	}

	async fn insert_batch(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		let record_batch = self.docs_to_record_batch(docs, embeddings)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if table_exists(&self.db, &self.table_name).await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}

	fn docs_to_record_batch(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let dim = i32::try_from(self.dim)?;
		let schema = build_arrow_schema(dim);
		let mut ids = Vec::new(); let mut sources = Vec::new(); let mut pages = Vec::new(); let mut sections = Vec::new(); let mut contents = Vec::new(); let mut metas = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for (doc, emb) in docs.iter().zip(embeddings) {
			ensure!(emb.len() == self.dim, "chunk {} has a {}-dim embedding", doc.chunk_id, emb.len());
			ids.push(doc.chunk_id.clone()); sources.push(doc.metadata.source.clone()); pages.push(i32::try_from(doc.metadata.page)?); sections.push(doc.metadata.section.clone()); contents.push(doc.content.clone());
			metas.push(serde_json::to_string(&doc.metadata.flags)?);
			vectors.push(Some(emb.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(sources)),
			Arc::new(Int32Array::from(pages)),
			Arc::new(StringArray::from(sections)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
		])?;
		Ok(record_batch)
	}
}

fn progress_bar(len: usize, msg: &'static str) -> Result<ProgressBar> {
	let pb = ProgressBar::new(len as u64);
	pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
	pb.set_message(msg);
	Ok(pb)
}
