use anyhow::anyhow;
use tracing::debug;

use graderag_core::error::{Error, Result};
use graderag_core::traits::{Embedder, VectorIndex};
use graderag_core::types::{Category, RetrievalResult};

/// Similarity-filtered top-k retrieval over one loaded category index.
pub struct RetrievalService<'a, H> {
    index: H,
    embedder: &'a dyn Embedder,
    top_k: usize,
    similarity_cutoff: f32,
}

impl<'a, H: VectorIndex> RetrievalService<'a, H> {
    pub fn new(index: H, embedder: &'a dyn Embedder, category: &Category) -> Self {
        Self::with_params(index, embedder, category.top_k, category.similarity_cutoff)
    }

    pub fn with_params(
        index: H,
        embedder: &'a dyn Embedder,
        top_k: usize,
        similarity_cutoff: f32,
    ) -> Self {
        Self { index, embedder, top_k, similarity_cutoff }
    }

    /// At most `top_k` passages scoring at least `similarity_cutoff`, best
    /// first. No match is an empty result, not an error.
    pub fn query(&self, text: &str) -> Result<RetrievalResult> {
        let query_vec = self
            .embedder
            .embed_batch(&[text.to_string()])
            .map_err(Error::Embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding(anyhow!("embedder returned no vector for the query")))?;

        let candidates = self.index.search_vec(&query_vec, self.top_k).map_err(Error::Storage)?;
        let found = candidates.len();
        let mut passages: Vec<_> =
            candidates.into_iter().filter(|p| p.score >= self.similarity_cutoff).collect();
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(self.top_k);
        debug!(
            "{} of {} candidates passed cutoff {}",
            passages.len(),
            found,
            self.similarity_cutoff
        );

        Ok(RetrievalResult { passages })
    }
}
