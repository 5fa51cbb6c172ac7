use std::path::Path;

use crate::types::{DocumentChunk, Passage};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (recorded in each index catalog).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Longest input, in tokens, the model embeds without truncation.
    fn max_len(&self) -> usize;
    /// One L2-normalized vector of length `dim()` per input text.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Writes and reopens the vector artifact inside a category's index directory.
/// The artifact format is owned by the implementation.
pub trait IndexBackend: Send + Sync {
    type Handle: VectorIndex;

    /// Write a complete index for `chunks` into `location`, which exists and is empty.
    fn persist(
        &self,
        location: &Path,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        dim: usize,
    ) -> anyhow::Result<()>;

    fn open(&self, location: &Path) -> anyhow::Result<Self::Handle>;
}

pub trait VectorIndex: Send + Sync {
    /// Up to `k` nearest chunks, best first.
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<Passage>>;
}
