//! Lists the index state of every configured grade.

use anyhow::Result;
use clap::Parser;

use graderag_cli::{init_logging, load_settings, open_store, CommonArgs};

#[derive(Parser)]
#[command(name = "graderag-status", version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    let settings = load_settings(cli.common.config_dir.as_deref())?;
    let store = open_store(&settings)?;
    for grade in &settings.grades {
        match store.catalog(grade) {
            Ok(Some(c)) => println!(
                "{grade}: ready ({} documents, {} chunks, {} dim {}, built {})",
                c.documents.len(),
                c.chunk_count,
                c.embedder_id,
                c.dim,
                c.built_at
            ),
            Ok(None) => println!("{grade}: not built ({})", store.location(grade).display()),
            Err(e) => println!("{grade}: unreadable: {e}"),
        }
    }
    Ok(())
}
