//! Builds the vector index of every configured grade that does not have one yet.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use graderag_cli::{configured_category, init_logging, load_settings, open_store, CommonArgs};
use graderag_embed::get_default_embedder;
use graderag_index::{BuildOutcome, IndexBuilder};

#[derive(Parser)]
#[command(name = "graderag-build", version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Only build these grades (default: all configured grades)
    #[arg(short, long = "grade")]
    grades: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    let settings = load_settings(cli.common.config_dir.as_deref())?;
    let categories = if cli.grades.is_empty() {
        settings.categories()
    } else {
        cli.grades.iter().map(|g| configured_category(&settings, g)).collect::<Result<Vec<_>>>()?
    };

    let store = open_store(&settings)?;
    let embedder = get_default_embedder(&settings.embedding_model)?;
    let builder = IndexBuilder::new(&store, embedder.as_ref(), &settings.embedding_model)
        .with_smoke_query(settings.query_config.smoke_query.clone());

    let report = builder.build_all(&categories);
    for (grade, outcome) in &report.outcomes {
        match outcome {
            BuildOutcome::Built { documents, chunks } => {
                println!("{grade}: built ({documents} documents, {chunks} chunks)")
            }
            BuildOutcome::Skipped => println!("{grade}: already built"),
        }
    }
    for (grade, e) in &report.failures {
        println!("{grade}: FAILED: {e}");
    }

    if !report.is_success() {
        error!("{} of {} grades failed", report.failures.len(), categories.len());
        std::process::exit(1);
    }
    info!("All grades indexed under {}", settings.databases_dir.display());
    Ok(())
}
