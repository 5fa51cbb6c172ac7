//! Setup shared by the graderag binaries.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use graderag_core::config::{Config, Settings};
use graderag_core::types::Category;
use graderag_index::CategoryIndexStore;
use graderag_vector::LanceBackend;

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Settings from `config.toml` (and overlays) in `config_dir`, or the working directory.
pub fn load_settings(config_dir: Option<&Path>) -> Result<Settings> {
    let config = match config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
    .context("loading configuration")?;
    Ok(config.settings()?)
}

/// The [`Category`] of a grade listed in the configuration.
pub fn configured_category(settings: &Settings, grade: &str) -> Result<Category> {
    if !settings.grades.iter().any(|g| g == grade) {
        bail!("grade '{grade}' is not configured (known: {})", settings.grades.join(", "));
    }
    Ok(settings.category(grade))
}

pub fn open_store(settings: &Settings) -> Result<CategoryIndexStore<LanceBackend>> {
    Ok(CategoryIndexStore::new(settings.databases_dir.clone(), LanceBackend::new()?))
}

/// Common `--config-dir` / `--verbose` flags.
#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Directory containing config.toml (default: current directory)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
