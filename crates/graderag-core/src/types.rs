//! Domain types shared by the cleaner, the index store and retrieval.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type ChunkId = String;

/// A named corpus partition ("grade") with its own source directory,
/// persisted index location and retrieval parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub source_dir: PathBuf,
    pub index_dir: PathBuf,
    pub top_k: usize,
    pub similarity_cutoff: f32,
}

/// One source file as read from a category directory.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub doc_id: String,
    pub doc_path: PathBuf,
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Metadata,
    ListItem,
    Narrative,
}

/// A typed fragment produced by cleaning one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, content: impl Into<String>) -> Self {
        Self { kind, content: content.into() }
    }
}

/// The flat text handed to chunking and embedding, 1:1 with a [`RawDocument`].
#[derive(Debug, Clone)]
pub struct CleanedDocument {
    pub doc_id: String,
    pub doc_path: PathBuf,
    pub category: String,
    pub text: String,
}

/// A chunk of a cleaned document that is independently embedded.
///
/// - `id`: `<doc_id>:<chunk_index>`, unique within a category
/// - `doc_id`: file name of the source document
/// - `doc_path`: original path to the source file
/// - `category`: grade the document belongs to
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub category: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A stored chunk returned by a nearest-neighbour search. `score` is cosine
/// similarity; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub text: String,
    pub score: f32,
}

/// Passages that survived the similarity cutoff, best first, at most `top_k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// `Context:` block followed by each passage, blank-line separated.
    pub fn context_block(&self) -> String {
        let mut context = String::from("Context:\n");
        for p in &self.passages {
            context.push_str(&p.text);
            context.push_str("\n\n");
        }
        context
    }

    /// Grounded prompt for the chat layer.
    pub fn prompt_for(&self, question: &str) -> String {
        let body = self.passages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");
        format!("Context:\n{body}\n\nUser Prompt:\n{question}")
    }
}
