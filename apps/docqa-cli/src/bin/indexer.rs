use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use docqa_cli::{init_tracing, load_settings};
use docqa_core::config::expand_path;
use docqa_core::data_processor::DataProcessor;
use docqa_embed::load_embedder;
use docqa_text::tantivy_utils::parse_language;
use docqa_text::TantivyIndexer;
use docqa_vector::LanceDbIndexer;

/// Chunk extracted text files and build the lexical and vector indices.
#[derive(Parser)]
#[command(name = "docqa-indexer", version)]
struct Args {
    /// Directory of `.txt` files (defaults to data.raw_txt_dir)
    data_dir: Option<PathBuf>,

    /// Do not rebuild the Tantivy index
    #[arg(short, long)]
    skip_lexical: bool,

    /// Only ingest the first N files
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = load_settings()?;
    let data_dir = args.data_dir.unwrap_or_else(|| expand_path(&settings.data.raw_txt_dir));
    info!(dir = %data_dir.display(), "ingesting");

    let processor = DataProcessor::new();
    let chunks = match args.limit {
        Some(limit) => processor.process_directory_limited(&data_dir, limit)?,
        None => processor.process_directory(&data_dir)?,
    };
    if chunks.is_empty() {
        anyhow::bail!("no chunks produced from {}", data_dir.display());
    }

    let lexical_count = if args.skip_lexical {
        info!("skipping lexical index");
        None
    } else {
        let language = parse_language(&settings.models.lexical_language)?;
        let indexer = TantivyIndexer::create(expand_path(&settings.data.tantivy_dir), language)?;
        Some(indexer.index(&chunks)?)
    };

    let embedder = load_embedder(&settings.models)?;
    let lancedb_dir = expand_path(&settings.data.lancedb_dir);
    let indexer = LanceDbIndexer::new(&lancedb_dir, &settings.data.table, embedder.dim()).await?;
    indexer.reset()?;
    let vector_count = indexer.index_chunks(&chunks, embedder, &settings.models.passage_prefix).await?;

    println!("Indexed {} chunks from {}", chunks.len(), data_dir.display());
    if let Some(n) = lexical_count {
        println!("  lexical: {n} chunks -> {}", settings.data.tantivy_dir);
    }
    println!("  vector:  {vector_count} chunks -> {}/{}", settings.data.lancedb_dir, settings.data.table);
    Ok(())
}
