use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use graderag_core::types::Passage;

/// Cosine nearest neighbours of `query_vec`, best first. `score` is
/// `1 - cosine distance`.
pub async fn search_passages(table: &Table, query_vec: &[f32], k: usize) -> Result<Vec<Passage>> {
    if k == 0 || table.count_rows(None).await? == 0 {
        return Ok(Vec::new());
    }
    let mut stream = table
        .vector_search(query_vec.to_vec())?
        .distance_type(DistanceType::Cosine)
        .limit(k)
        .execute()
        .await?;

    let mut passages = Vec::new();
    while let Some(batch) = stream.try_next().await? {
        let ids = string_column(&batch, "id")?;
        let doc_ids = string_column(&batch, "doc_id")?;
        let paths = string_column(&batch, "doc_path")?;
        let contents = string_column(&batch, "content")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow!("search result lacks _distance column"))?;
        for i in 0..batch.num_rows() {
            let score =
                if distances.is_valid(i) { 1.0 - distances.value(i) } else { f32::NEG_INFINITY };
            passages.push(Passage {
                chunk_id: ids.value(i).to_string(),
                doc_id: doc_ids.value(i).to_string(),
                doc_path: paths.value(i).to_string(),
                text: contents.value(i).to_string(),
                score,
            });
        }
    }
    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
    passages.truncate(k);
    Ok(passages)
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("search result lacks string column '{name}'"))
}
