use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use graderag_core::error::{Error, Result};
use graderag_core::types::{CleanedDocument, DocumentChunk};

/// Marker file inside a category index directory. Its presence means the
/// index is complete.
pub const CATALOG_FILE: &str = "docstore.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub doc_id: String,
    pub doc_path: String,
    /// blake3 of the cleaned text
    pub content_hash: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCatalog {
    pub grade: String,
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub built_at: String,
    pub chunk_count: usize,
    pub documents: Vec<CatalogEntry>,
}

pub struct CatalogParams<'a> {
    pub grade: &'a str,
    pub embedder_id: &'a str,
    pub dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IndexCatalog {
    pub fn describe(
        params: CatalogParams<'_>,
        documents: &[CleanedDocument],
        chunks: &[DocumentChunk],
    ) -> Self {
        let mut per_doc: BTreeMap<&str, usize> = BTreeMap::new();
        for chunk in chunks {
            *per_doc.entry(chunk.doc_id.as_str()).or_default() += 1;
        }
        let documents = documents
            .iter()
            .map(|doc| CatalogEntry {
                doc_id: doc.doc_id.clone(),
                doc_path: doc.doc_path.to_string_lossy().into_owned(),
                content_hash: blake3::hash(doc.text.as_bytes()).to_hex().to_string(),
                chunks: per_doc.get(doc.doc_id.as_str()).copied().unwrap_or(0),
            })
            .collect();
        Self {
            grade: params.grade.to_string(),
            embedder_id: params.embedder_id.to_string(),
            dim: params.dim,
            chunk_size: params.chunk_size,
            chunk_overlap: params.chunk_overlap,
            built_at: chrono::Utc::now().to_rfc3339(),
            chunk_count: chunks.len(),
            documents,
        }
    }

    pub fn read(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(CATALOG_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::CorruptCatalog { path, reason: e.to_string() })
    }

    /// Writes `docstore.json` into `index_dir` via a temporary file and rename,
    /// so a reader never observes a partial marker.
    pub fn write_atomic(&self, index_dir: &Path) -> Result<()> {
        let path = index_dir.join(CATALOG_FILE);
        let tmp_path = index_dir.join(format!("{CATALOG_FILE}.tmp"));
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::CorruptCatalog { path: path.clone(), reason: e.to_string() })?;
        let mut file = fs::File::create(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;
        file.write_all(&json).map_err(|e| Error::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| Error::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| Error::io(&path, e))
    }
}
