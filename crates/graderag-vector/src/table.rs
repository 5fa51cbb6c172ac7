//! LanceDB connection helpers.

use anyhow::Result;
use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use std::path::Path;
use std::sync::Arc;

pub async fn open_db(location: &Path) -> Result<Connection> {
    Ok(connect(location.to_string_lossy().as_ref()).execute().await?)
}

pub async fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if has_table(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub async fn open_table(conn: &Connection, name: &str) -> Result<Table> {
    Ok(conn.open_table(name).execute().await?)
}
