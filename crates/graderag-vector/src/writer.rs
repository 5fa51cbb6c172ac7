use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::info;

use graderag_core::types::DocumentChunk;

use crate::schema::build_chunk_schema;
use crate::table::{ensure_table, has_table};

const BATCH_SIZE: usize = 1000;
const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}";

pub struct LanceChunkWriter<'a> {
    db: &'a Connection,
    table_name: &'a str,
    dim: usize,
}

impl<'a> LanceChunkWriter<'a> {
    pub fn new(db: &'a Connection, table_name: &'a str, dim: usize) -> Self {
        Self { db, table_name, dim }
    }

    /// Writes every chunk with its embedding. With no chunks an empty table is
    /// still created so the index can be opened and searched.
    pub async fn write(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        ensure!(
            chunks.len() == embeddings.len(),
            "chunks and embeddings length must match ({} != {})",
            chunks.len(),
            embeddings.len()
        );
        if chunks.is_empty() {
            info!("No chunks to index; creating empty table {}", self.table_name);
            return ensure_table(self.db, self.table_name, build_chunk_schema(self.dim)).await;
        }

        info!("Indexing {} chunks into LanceDB table: {}", chunks.len(), self.table_name);
        let pb = ProgressBar::new(chunks.len() as u64);
        let style = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE)?;
        pb.set_style(style.progress_chars("#>-"));
        let batches = chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE));
        for (batch_chunks, batch_vecs) in batches {
            self.insert_batch(batch_chunks, batch_vecs).await?;
            pb.inc(batch_chunks.len() as u64);
        }
        pb.finish_with_message("done");
        info!("Indexed {} chunks into {}", chunks.len(), self.table_name);
        Ok(())
    }

    async fn insert_batch(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let record_batch = self.to_record_batch(chunks, embeddings)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if has_table(self.db, self.table_name).await? {
            self.db.open_table(self.table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    fn to_record_batch(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<RecordBatch> {
        if let Some((i, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != self.dim) {
            let (id, got, dim) = (&chunks[i].id, v.len(), self.dim);
            anyhow::bail!("embedding for chunk {id} has {got} dims, expected {dim}");
        }
        let strings =
            |f: fn(&DocumentChunk) -> &str| StringArray::from_iter_values(chunks.iter().map(f));
        let ints = |f: fn(&DocumentChunk) -> usize| {
            Int32Array::from_iter_values(chunks.iter().map(|c| f(c) as i32))
        };
        let vectors =
            embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));

        let record_batch = RecordBatch::try_new(
            build_chunk_schema(self.dim),
            vec![
                Arc::new(strings(|c| c.id.as_str())),
                Arc::new(strings(|c| c.doc_id.as_str())),
                Arc::new(strings(|c| c.doc_path.as_str())),
                Arc::new(strings(|c| c.category.as_str())),
                Arc::new(strings(|c| c.content.as_str())),
                Arc::new(ints(|c| c.chunk_index)),
                Arc::new(ints(|c| c.total_chunks)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                    vectors,
                    self.dim as i32,
                )),
            ],
        )?;
        Ok(record_batch)
    }
}
