#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use graderag_core::config::EmbeddingSettings;
use graderag_core::traits::{Embedder, IndexBackend, VectorIndex};
use graderag_core::types::{Category, DocumentChunk, Passage};
use graderag_embed::HashEmbedder;
use graderag_index::{CatalogParams, IndexCatalog};

pub const DIM: usize = 32;

pub fn embedding_settings() -> EmbeddingSettings {
    EmbeddingSettings { name: "hash".into(), chunk_size: 256, chunk_overlap: 16 }
}

pub fn category(root: &Path, name: &str, databases_dir: &Path) -> Category {
    Category {
        name: name.to_string(),
        source_dir: root.join(name),
        index_dir: databases_dir.join(format!("{name}_vector_db")),
        top_k: 3,
        similarity_cutoff: 0.0,
    }
}

pub fn write_corpus(root: &Path, name: &str, files: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for (file, text) in files {
        fs::write(dir.join(file), text).unwrap();
    }
}

/// Hash embedder that counts texts and can be told to fail.
pub struct CountingEmbedder {
    inner: HashEmbedder,
    max_len: usize,
    pub texts: AtomicUsize,
    pub fail: AtomicBool,
}

impl Default for CountingEmbedder {
    fn default() -> Self {
        Self::with_max_len(usize::MAX)
    }
}

impl CountingEmbedder {
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: HashEmbedder::new(DIM),
            max_len,
            texts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        "counting-hash"
    }
    fn dim(&self) -> usize {
        DIM
    }
    fn max_len(&self) -> usize {
        self.max_len
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Backend that stores chunks and vectors as JSON and counts persists.
#[derive(Clone, Default)]
pub struct JsonBackend {
    pub persists: Arc<AtomicUsize>,
}

const ROWS_FILE: &str = "rows.json";

impl IndexBackend for JsonBackend {
    type Handle = MemoryIndex;

    fn persist(
        &self,
        location: &Path,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        _dim: usize,
    ) -> anyhow::Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<(DocumentChunk, Vec<f32>)> =
            chunks.iter().cloned().zip(embeddings.iter().cloned()).collect();
        fs::write(location.join(ROWS_FILE), serde_json::to_vec(&rows)?)?;
        Ok(())
    }

    fn open(&self, location: &Path) -> anyhow::Result<MemoryIndex> {
        let rows = serde_json::from_slice(&fs::read(location.join(ROWS_FILE))?)?;
        Ok(MemoryIndex { rows })
    }
}

/// While persisting, a second build of the same grade finishes and publishes
/// its own complete index at `rival`, tagged with [`RIVAL_EMBEDDER`].
pub struct RacingBackend {
    pub inner: JsonBackend,
    pub rival: PathBuf,
}

pub const RIVAL_EMBEDDER: &str = "rival-build";

impl IndexBackend for RacingBackend {
    type Handle = MemoryIndex;

    fn persist(
        &self,
        location: &Path,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        dim: usize,
    ) -> anyhow::Result<()> {
        self.inner.persist(location, chunks, embeddings, dim)?;
        if !self.rival.exists() {
            fs::create_dir_all(&self.rival)?;
            self.inner.persist(&self.rival, chunks, embeddings, dim)?;
            let params = CatalogParams {
                grade: "grade7",
                embedder_id: RIVAL_EMBEDDER,
                dim,
                chunk_size: 256,
                chunk_overlap: 16,
            };
            IndexCatalog::describe(params, &[], chunks).write_atomic(&self.rival)?;
        }
        Ok(())
    }

    fn open(&self, location: &Path) -> anyhow::Result<MemoryIndex> {
        self.inner.open(location)
    }
}

pub struct MemoryIndex {
    pub rows: Vec<(DocumentChunk, Vec<f32>)>,
}

impl VectorIndex for MemoryIndex {
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<Passage>> {
        let mut hits: Vec<Passage> = self
            .rows
            .iter()
            .map(|(c, v)| Passage {
                chunk_id: c.id.clone(),
                doc_id: c.doc_id.clone(),
                doc_path: c.doc_path.clone(),
                text: c.content.clone(),
                score: v.iter().zip(query_vec).map(|(a, b)| a * b).sum(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Returns fixed passages regardless of the query.
pub struct FixedIndex(pub Vec<Passage>);

impl VectorIndex for FixedIndex {
    fn search_vec(&self, _query_vec: &[f32], k: usize) -> anyhow::Result<Vec<Passage>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

pub fn passage(id: &str, score: f32) -> Passage {
    Passage {
        chunk_id: id.into(),
        doc_id: id.into(),
        doc_path: format!("/{id}"),
        text: format!("text of {id}"),
        score,
    }
}

pub fn index_dir(databases_dir: &Path, name: &str) -> PathBuf {
    databases_dir.join(format!("{name}_vector_db"))
}
