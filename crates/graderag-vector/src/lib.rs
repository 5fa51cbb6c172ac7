//! LanceDB storage for category indexes.
//!
//! Each category index directory holds a LanceDB database with a single
//! [`CHUNKS_TABLE`]. The async LanceDB client is driven by a runtime owned by
//! [`LanceBackend`], so the [`IndexBackend`] and [`VectorIndex`] impls are
//! blocking and must not be called from inside another tokio runtime.

use anyhow::Result;
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

use graderag_core::traits::{IndexBackend, VectorIndex};
use graderag_core::types::{DocumentChunk, Passage};

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use schema::{build_chunk_schema, CHUNKS_TABLE};
pub use search::search_passages;
pub use writer::LanceChunkWriter;

#[derive(Clone)]
pub struct LanceBackend {
    rt: Arc<Runtime>,
}

impl LanceBackend {
    pub fn new() -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(Self { rt: Arc::new(rt) })
    }
}

impl IndexBackend for LanceBackend {
    type Handle = LanceIndex;

    fn persist(
        &self,
        location: &Path,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        dim: usize,
    ) -> Result<()> {
        debug!("Persisting {} chunks to {}", chunks.len(), location.display());
        self.rt.block_on(async {
            let db = table::open_db(location).await?;
            LanceChunkWriter::new(&db, CHUNKS_TABLE, dim).write(chunks, embeddings).await
        })
    }

    fn open(&self, location: &Path) -> Result<LanceIndex> {
        let table = self.rt.block_on(async {
            let db = table::open_db(location).await?;
            table::open_table(&db, CHUNKS_TABLE).await
        })?;
        Ok(LanceIndex { rt: self.rt.clone(), table })
    }
}

/// An opened category index.
pub struct LanceIndex {
    rt: Arc<Runtime>,
    table: Table,
}

impl LanceIndex {
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.rt.block_on(self.table.count_rows(None))?)
    }
}

impl VectorIndex for LanceIndex {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<Passage>> {
        self.rt.block_on(search_passages(&self.table, query_vec, k))
    }
}
