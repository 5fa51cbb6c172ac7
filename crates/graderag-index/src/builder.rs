use anyhow::anyhow;
use tracing::{error, info, warn};

use graderag_core::config::EmbeddingSettings;
use graderag_core::data_processor::{
    load_category, Chunker, ChunkingConfig, DocumentProcessor,
};
use graderag_core::error::{Error, Result};
use graderag_core::traits::{Embedder, IndexBackend};
use graderag_core::types::{Category, DocumentChunk};

use crate::catalog::{CatalogParams, IndexCatalog};
use crate::retrieval::RetrievalService;
use crate::store::{CategoryIndexStore, Publication};

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built { documents: usize, chunks: usize },
    Skipped,
}

/// Per-category results of [`IndexBuilder::build_all`], in input order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<(String, BuildOutcome)>,
    pub failures: Vec<(String, Error)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn built(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, BuildOutcome::Built { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == BuildOutcome::Skipped).count()
    }
}

pub struct IndexBuilder<'a, B> {
    store: &'a CategoryIndexStore<B>,
    embedder: &'a dyn Embedder,
    chunking: ChunkingConfig,
    processor: DocumentProcessor,
    chunker: Chunker,
    smoke_query: Option<String>,
}

impl<'a, B: IndexBackend> IndexBuilder<'a, B> {
    /// Chunks larger than the embedder's input window are shrunk to fit it.
    pub fn new(
        store: &'a CategoryIndexStore<B>,
        embedder: &'a dyn Embedder,
        settings: &EmbeddingSettings,
    ) -> Self {
        let configured = ChunkingConfig::from(settings);
        let chunking = configured.capped_to(embedder.max_len());
        if chunking != configured {
            warn!(
                "chunk_size {} exceeds the {} token window of {}; using {}",
                configured.chunk_size,
                embedder.max_len(),
                embedder.embedder_id(),
                chunking.chunk_size
            );
        }
        Self {
            store,
            embedder,
            chunking,
            processor: DocumentProcessor::default(),
            chunker: Chunker::new(chunking),
            smoke_query: None,
        }
    }

    /// Query run against every freshly built index; its hit count is logged.
    /// A blank query disables the check.
    pub fn with_smoke_query(mut self, query: Option<String>) -> Self {
        self.smoke_query = query.filter(|q| !q.trim().is_empty());
        self
    }

    /// Builds the category's index unless a complete one already exists.
    pub fn ensure_index(&self, category: &Category) -> Result<BuildOutcome> {
        let grade = category.name.as_str();
        let location = self.store.location(grade);
        if category.index_dir != location {
            return Err(Error::InvalidConfig(format!(
                "grade '{grade}' expects its index at {}, but the store keeps it at {}",
                category.index_dir.display(),
                location.display()
            )));
        }
        if self.store.is_complete(grade) {
            info!(grade, "Index already exists at {}; skipping", location.display());
            return Ok(BuildOutcome::Skipped);
        }

        info!(grade, "Building index from {}", category.source_dir.display());
        let raw = load_category(category)?;
        let cleaned = self.processor.process(&raw);
        let chunks = self.chunker.chunk_all(&cleaned);
        info!(grade, "{} documents -> {} chunks", cleaned.len(), chunks.len());

        let embeddings = self.embed_chunks(&chunks)?;
        let catalog = IndexCatalog::describe(
            CatalogParams {
                grade,
                embedder_id: self.embedder.embedder_id(),
                dim: self.embedder.dim(),
                chunk_size: self.chunking.chunk_size,
                chunk_overlap: self.chunking.chunk_overlap,
            },
            &cleaned,
            &chunks,
        );

        match self.store.publish(&catalog, &chunks, &embeddings)? {
            Publication::Superseded => Ok(BuildOutcome::Skipped),
            Publication::Published => {
                self.run_smoke_query(category);
                Ok(BuildOutcome::Built { documents: cleaned.len(), chunks: chunks.len() })
            }
        }
    }

    /// Runs [`Self::ensure_index`] for every category. A failing category is
    /// logged and recorded; the remaining ones are still built.
    pub fn build_all(&self, categories: &[Category]) -> BuildReport {
        let mut report = BuildReport::default();
        for category in categories {
            match self.ensure_index(category) {
                Ok(outcome) => report.outcomes.push((category.name.clone(), outcome)),
                Err(e) => {
                    error!(grade = %category.name, "Index build failed: {e}");
                    report.failures.push((category.name.clone(), e));
                }
            }
        }
        info!(
            "Build finished: {} built, {} skipped, {} failed",
            report.built(),
            report.skipped(),
            report.failures.len()
        );
        report
    }

    fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
        let dim = self.embedder.dim();
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).map_err(Error::Embedding)?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(anyhow!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
                let got = v.len();
                return Err(Error::Embedding(anyhow!(
                    "embedder returned {got} dims, expected {dim}"
                )));
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    fn run_smoke_query(&self, category: &Category) {
        let Some(query) = self.smoke_query.as_deref() else { return };
        let grade = category.name.as_str();
        let result = self.store.load_index(grade).and_then(|loaded| {
            RetrievalService::new(loaded.handle, self.embedder, category).query(query)
        });
        match result {
            Ok(found) => {
                info!(grade, "Smoke query {query:?} returned {} passages", found.len())
            }
            Err(e) => warn!(grade, "Smoke query {query:?} failed: {e}"),
        }
    }
}
