use clap::Parser;

use docqa_cli::{build_service, init_tracing};

/// Run retrieval only and print the final ranked passages.
#[derive(Parser)]
#[command(name = "docqa-search", version)]
struct Args {
    question: String,

    /// Number of passages (0 = configured k_final)
    #[arg(short = 'k', long, default_value_t = 0)]
    top_k: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    if args.question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }
    let service = build_service().await;
    let Some(engine) = service.engine() else {
        let reason = service.init_error().map(ToString::to_string).unwrap_or_default();
        anyhow::bail!("RAG engine not ready: {reason}");
    };
    let k_final = engine.effective_k_final(args.top_k);
    let results = engine.retrieve(&args.question, k_final).await;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in results.iter().enumerate() {
        let meta = &hit.document.metadata;
        let snippet: String = hit.document.content.chars().take(160).collect::<String>().replace('\n', " ");
        println!("{:>2}. [{:.4}] {} | {}", rank + 1, hit.relevance_score, meta.citation(), meta.section);
        println!("    {snippet}");
    }
    Ok(())
}
