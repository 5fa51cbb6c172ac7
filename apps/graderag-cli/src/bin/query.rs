//! Retrieves the passages of one grade's index relevant to a question.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use graderag_cli::{configured_category, init_logging, load_settings, open_store, CommonArgs};
use graderag_embed::get_default_embedder;
use graderag_index::RetrievalService;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Ranked passages with scores
    List,
    /// `Context:` block handed to the chat layer
    Context,
    /// Context block followed by the question
    Prompt,
    Json,
}

#[derive(Parser)]
#[command(name = "graderag-query", version, about)]
struct Cli {
    /// Grade whose index to search
    grade: String,

    /// Question text
    query: String,

    /// Override `query_config.top_k`
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Override `query_config.similarity_cutoff`
    #[arg(long)]
    cutoff: Option<f32>,

    /// How to print the result
    #[arg(long, value_enum, default_value_t = Format::List)]
    format: Format,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    let settings = load_settings(cli.common.config_dir.as_deref())?;
    let category = configured_category(&settings, &cli.grade)?;
    let store = open_store(&settings)?;
    let loaded = store
        .load_index(&category.name)
        .with_context(|| format!("run graderag-build for '{}' first", category.name))?;
    let embedder = get_default_embedder(&settings.embedding_model)?;

    let service = RetrievalService::with_params(
        loaded.handle,
        embedder.as_ref(),
        cli.top_k.unwrap_or(category.top_k).max(1),
        cli.cutoff.unwrap_or(category.similarity_cutoff),
    );
    let result = service.query(&cli.query)?;

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Context => print!("{}", result.context_block()),
        Format::Prompt => println!("{}", result.prompt_for(&cli.query)),
        Format::List if result.is_empty() => println!("No passages above the similarity cutoff."),
        Format::List => {
            for (rank, p) in result.passages.iter().enumerate() {
                println!("{}. [{:.3}] {} ({})", rank + 1, p.score, p.doc_id, p.chunk_id);
                println!("   {}", p.text.replace('\n', "\n   "));
            }
        }
    }
    Ok(())
}
