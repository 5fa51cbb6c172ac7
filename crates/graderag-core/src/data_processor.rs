use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cleaner::{TextNormalizer, EMBEDDED_KINDS};
use crate::config::EmbeddingSettings;
use crate::error::{Error, Result};
use crate::types::{Category, CleanedDocument, DocumentChunk, RawDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Estimated tokens per chunk.
    pub chunk_size: usize,
    /// Estimated tokens shared by consecutive chunks of one document.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1024, chunk_overlap: 20 }
    }
}

impl ChunkingConfig {
    /// Shrinks `chunk_size` to at most `max_tokens`, keeping the overlap below it.
    pub fn capped_to(self, max_tokens: usize) -> Self {
        if self.chunk_size <= max_tokens {
            return self;
        }
        let chunk_size = max_tokens.max(1);
        Self { chunk_size, chunk_overlap: self.chunk_overlap.min(chunk_size - 1) }
    }
}

impl From<&EmbeddingSettings> for ChunkingConfig {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self { chunk_size: settings.chunk_size, chunk_overlap: settings.chunk_overlap }
    }
}

/// Reads every regular file directly inside the category's source directory.
/// Hidden files are skipped; results are sorted by path.
pub fn load_category(category: &Category) -> Result<Vec<RawDocument>> {
    let dir = &category.source_dir;
    if fs::read_dir(dir).is_err() {
        return Err(Error::SourceNotFound { grade: category.name.clone(), path: dir.clone() });
    }

    let files = list_sources(dir);
    let mut documents = Vec::with_capacity(files.len());
    for (file_index, file_path) in files.iter().enumerate() {
        debug!(
            grade = %category.name,
            "Reading file {}/{}: {}",
            file_index + 1,
            files.len(),
            file_path.display()
        );
        documents.push(RawDocument {
            doc_id: doc_id(file_path),
            text: read_file_content(file_path)?,
            doc_path: file_path.clone(),
            category: category.name.clone(),
        });
    }
    info!(grade = %category.name, "Loaded {} documents from {}", documents.len(), dir.display());
    Ok(documents)
}

fn read_file_content(file_path: &Path) -> Result<String> {
    let bytes = fs::read(file_path).map_err(|e| Error::io(file_path, e))?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn doc_id(file_path: &Path) -> String {
    file_path
        .file_name()
        .map_or_else(
            || file_path.to_string_lossy().into_owned(),
            |n| n.to_string_lossy().into_owned(),
        )
}

/// Reduces raw documents to the flat text that gets chunked and embedded.
#[derive(Debug, Default, Clone)]
pub struct DocumentProcessor {
    normalizer: TextNormalizer,
}

impl DocumentProcessor {
    pub fn new(normalizer: TextNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn process(&self, documents: &[RawDocument]) -> Vec<CleanedDocument> {
        documents.iter().map(|doc| self.process_one(doc)).collect()
    }

    pub fn process_one(&self, doc: &RawDocument) -> CleanedDocument {
        let text = self
            .normalizer
            .clean(&doc.text)
            .into_iter()
            .filter(|segment| EMBEDDED_KINDS.contains(&segment.kind))
            .map(|segment| segment.content)
            .collect::<Vec<_>>()
            .join("\n");
        CleanedDocument {
            doc_id: doc.doc_id.clone(),
            doc_path: doc.doc_path.clone(),
            category: doc.category.clone(),
            text,
        }
    }
}

/// Splits cleaned documents into embedding-sized chunks.
#[derive(Debug, Default, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk_all(&self, documents: &[CleanedDocument]) -> Vec<DocumentChunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }

    pub fn chunk(&self, doc: &CleanedDocument) -> Vec<DocumentChunk> {
        let text = doc.text.trim();
        if text.is_empty() {
            return vec![];
        }
        let pieces = if count_tokens(text) <= self.config.chunk_size {
            vec![text.to_string()]
        } else {
            self.split_with_overlap(text)
        };

        let total_chunks = pieces.len();
        let doc_path = doc.doc_path.to_string_lossy().into_owned();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                id: format!("{}:{}", doc.doc_id, chunk_index),
                doc_id: doc.doc_id.clone(),
                doc_path: doc_path.clone(),
                category: doc.category.clone(),
                content,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    fn split_with_overlap(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let words_per_chunk = tokens_to_words(self.config.chunk_size).max(1);
        let overlap_words = tokens_to_words(self.config.chunk_overlap).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
        chunks
    }
}

/// Rough token estimate: one token per 0.75 words.
pub fn count_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

fn tokens_to_words(tokens: usize) -> usize {
    (tokens as f32 * 0.75) as usize
}

/// Regular, non-hidden files directly inside `dir`, sorted.
pub fn list_sources(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !e.file_name().to_string_lossy().starts_with('.'))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}
