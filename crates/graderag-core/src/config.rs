//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_QUERY_CONFIG__TOP_K=5`).
//! [`Config::settings`] extracts and validates the typed [`Settings`].

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Category;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| Error::io(".", e))?;
        Self::load_from(&cwd)
    }

    /// Load `config.toml` and its environment overlay from `base_dir`.
    /// Relative paths in the configuration resolve against `base_dir`.
    pub fn load_from(base_dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        let overlay = match env_name.as_str() {
            "dev" | "development" => Some("config.dev.toml"),
            "prod" | "production" => Some("config.prod.toml"),
            "test" | "testing" => Some("config.test.toml"),
            _ => None,
        };
        if let Some(file) = overlay {
            figment = figment.merge(Toml::file(base_dir.join(file)));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    /// Build from an inline TOML document (no env overlay).
    pub fn from_toml_str(toml: &str, base_dir: &Path) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)), base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        let raw: RawSettings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let settings = Settings {
            root_dir: resolve_with_base(&self.base_dir, &raw.root_dir),
            databases_dir: resolve_with_base(&self.base_dir, &raw.databases_dir),
            grades: raw.grades,
            embedding_model: raw.embedding_model,
            query_config: raw.query_config,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    root_dir: String,
    databases_dir: String,
    grades: Vec<String>,
    embedding_model: EmbeddingSettings,
    query_config: QuerySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    pub top_k: usize,
    pub similarity_cutoff: f32,
    /// Query run once against every freshly built index as a self-check.
    #[serde(default)]
    pub smoke_query: Option<String>,
}

/// Validated, immutable runtime settings. Passed explicitly to every
/// component that needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root_dir: PathBuf,
    pub databases_dir: PathBuf,
    pub grades: Vec<String>,
    pub embedding_model: EmbeddingSettings,
    pub query_config: QuerySettings,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.grades.is_empty() {
            return Err(Error::InvalidConfig("`grades` must list at least one grade".into()));
        }
        let mut seen = HashSet::new();
        for grade in &self.grades {
            let path_like = grade.contains(&['/', '\\'][..]) || grade == "." || grade == "..";
            if grade.trim().is_empty() || path_like {
                return Err(Error::InvalidConfig(format!("invalid grade name '{grade}'")));
            }
            if !seen.insert(grade.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate grade '{grade}'")));
            }
        }
        let em = &self.embedding_model;
        if em.chunk_size == 0 {
            return Err(Error::InvalidConfig("`embedding_model.chunk_size` must be > 0".into()));
        }
        if em.chunk_overlap >= em.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "`embedding_model.chunk_overlap` ({}) must be smaller than `chunk_size` ({})",
                em.chunk_overlap, em.chunk_size
            )));
        }
        let q = &self.query_config;
        if q.top_k == 0 {
            return Err(Error::InvalidConfig("`query_config.top_k` must be > 0".into()));
        }
        if !q.similarity_cutoff.is_finite() {
            return Err(Error::InvalidConfig(
                "`query_config.similarity_cutoff` must be a finite number".into(),
            ));
        }
        Ok(())
    }

    /// One [`Category`] per configured grade, in configuration order.
    pub fn categories(&self) -> Vec<Category> {
        self.grades.iter().map(|g| self.category(g)).collect()
    }

    pub fn category(&self, grade: &str) -> Category {
        Category {
            name: grade.to_string(),
            source_dir: self.root_dir.join(grade),
            index_dir: index_location(&self.databases_dir, grade),
            top_k: self.query_config.top_k,
            similarity_cutoff: self.query_config.similarity_cutoff,
        }
    }
}

/// `<databases_dir>/<grade>_vector_db`
pub fn index_location(databases_dir: &Path, grade: &str) -> PathBuf {
    databases_dir.join(format!("{grade}_vector_db"))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
