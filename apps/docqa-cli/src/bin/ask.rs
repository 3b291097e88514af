use clap::Parser;
use tracing::warn;

use docqa_cli::{build_service, generation_backend_reachable, init_tracing, load_settings, write_frames};
use docqa_rag::wire::encode_stream;

/// Stream an answer in wire format (metadata frame, tokens, optional error) to stdout.
#[derive(Parser)]
#[command(name = "docqa-ask", version)]
struct Args {
    /// The question to answer
    question: Option<String>,

    /// Number of passages in the context (0 = configured k_final)
    #[arg(short = 'k', long, default_value_t = 0)]
    top_k: usize,

    /// Print the health document and exit; backend reachability goes to the log
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let service = build_service().await;

    if args.health {
        if let Some(e) = service.init_error() {
            warn!(error = %e, "RAG engine not ready");
        }
        if let Ok(settings) = load_settings() {
            generation_backend_reachable(&settings.generation).await;
        }
        println!("{}", serde_json::to_string(&service.health())?);
        return Ok(());
    }

    let question = args.question.unwrap_or_default();
    if question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let frames = encode_stream(service.stream_answer(&question, args.top_k));
    write_frames(frames, &mut std::io::stdout()).await?;
    Ok(())
}
