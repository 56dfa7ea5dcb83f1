// ABOUTME: NULL auditing for columns about to be migrated
// ABOUTME: Counts NULLs per column in one query and appends findings to a run log

use crate::migration::catalog::SOURCE_SCHEMA;
use crate::utils::{quote_ident, quote_qualified, sanitize_identifier};
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_postgres::Client;

/// Append-only record writer for the run log
pub trait RunLog {
    fn append(&mut self, line: &str) -> Result<()>;
}

/// Run log backed by a plain text file
///
/// The file is truncated when created, so each attempt starts with an empty
/// log. Every record is flushed as it is written.
#[derive(Debug)]
pub struct FileRunLog {
    path: PathBuf,
    file: File,
}

impl FileRunLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log at {}", path.display()))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLog for FileRunLog {
    fn append(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{}", line)
            .and_then(|_| self.file.flush())
            .with_context(|| format!("Failed to write run log at {}", self.path.display()))
    }
}

/// Run log that keeps records in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryRunLog {
    lines: Vec<String>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl RunLog for MemoryRunLog {
    fn append(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Build the single query that counts NULLs for every column
///
/// `COUNT(*) FILTER` yields 0 on an empty table, never NULL.
pub fn null_count_query(table: &str, columns: &[String]) -> String {
    let counts: Vec<String> = columns
        .iter()
        .map(|c| format!("COUNT(*) FILTER (WHERE {} IS NULL)", quote_ident(c)))
        .collect();

    format!(
        "SELECT\n    {}\nFROM {}",
        counts.join(",\n    "),
        quote_qualified(SOURCE_SCHEMA, table)
    )
}

/// Format one run log record
pub fn null_report_line(table: &str, column: &str, count: i64) -> String {
    format!(
        "THERE ARE {} NULL VALUES IN {} COLUMN IN TABLE {}!",
        count, column, table
    )
}

/// Append one record per column that has NULLs
///
/// `counts` is positional with `columns`. Returns the number of records
/// written.
pub fn report_nulls(
    table: &str,
    columns: &[String],
    counts: &[i64],
    log: &mut dyn RunLog,
) -> Result<usize> {
    let mut written = 0;

    for (column, &count) in columns.iter().zip(counts) {
        if count > 0 {
            tracing::warn!(
                "⚠ {} NULL value(s) in column '{}' of table '{}'",
                count,
                sanitize_identifier(column),
                sanitize_identifier(table)
            );
            log.append(&null_report_line(table, column, count))?;
            written += 1;
        }
    }

    Ok(written)
}

/// Count NULLs per selected column and report them to the run log
///
/// Findings are informational. Migration proceeds regardless.
pub async fn process_nulls(
    client: &Client,
    table: &str,
    columns: &[String],
    log: &mut dyn RunLog,
) -> Result<usize> {
    if columns.is_empty() {
        return Ok(0);
    }

    let query = null_count_query(table, columns);
    let row = client.query_one(&query, &[]).await.with_context(|| {
        format!(
            "Failed to count NULL values in table '{}'",
            sanitize_identifier(table)
        )
    })?;

    let counts: Vec<i64> = (0..columns.len()).map(|idx| row.get(idx)).collect();

    report_nulls(table, columns, &counts, log)
}
