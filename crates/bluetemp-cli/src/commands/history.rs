//! History command implementation.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bluetemp_store::Store;

use super::Status;
use crate::cli::OutputFormat;
use crate::format::format_records;

pub async fn cmd_history(database: PathBuf, count: usize, format: OutputFormat) -> Result<Status> {
    let records = tokio::task::spawn_blocking(move || {
        let store = Store::open(&database)
            .with_context(|| format!("Failed to open database: {}", database.display()))?;
        store.recent(count).context("Failed to query stored readings")
    })
    .await
    .context("History task failed")??;

    let mut stdout = io::stdout();
    stdout.write_all(format_records(&records, format)?.as_bytes())?;
    stdout.flush()?;
    Ok(Status::Done)
}
