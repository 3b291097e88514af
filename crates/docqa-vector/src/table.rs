//! LanceDB connection helpers.
use anyhow::Result;
use lancedb::{connect, Connection};
use std::path::Path;

pub async fn open_db(db_path: &Path) -> Result<Connection> {
    Ok(connect(db_path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Removes the on-disk dataset of `name` so the next write starts fresh.
pub fn remove_table_dir(db_path: &Path, name: &str) -> Result<()> {
    let dir = db_path.join(format!("{name}.lance"));
    if dir.exists() { std::fs::remove_dir_all(&dir)?; }
    Ok(())
}
