// ABOUTME: Per-table and whole-run migration orchestration
// ABOUTME: Audits NULLs, creates the destination table, and streams INSERT batches into it

use crate::interactive::{ask_user_to_select, SelectionProvider};
use crate::migration::catalog::{list_columns, list_tables, SOURCE_SCHEMA};
use crate::migration::ddl::{generate_create_table_statement, CreateMode};
use crate::migration::executor::Executor;
use crate::migration::nulls::{process_nulls, RunLog};
use crate::migration::rows::{
    check_batch_size, stream_inserts, BatchSource, InsertStatements, DEFAULT_BATCH_SIZE,
};
use crate::utils::sanitize_identifier;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_postgres::Client;

/// Knobs shared by every table in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    pub batch_size: usize,
    pub create_mode: CreateMode,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            create_mode: CreateMode::default(),
        }
    }
}

/// Outcome of one migrated table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: u64,
    pub statements: u64,
}

/// Execute every remaining statement of a sequence against the destination
///
/// Stops at the first failing statement. Statements already executed stay
/// committed. Returns the number of statements executed by this call.
pub async fn apply_statements<S, E>(
    statements: &mut InsertStatements<S>,
    destination: &mut E,
    progress: &ProgressBar,
) -> Result<u64>
where
    S: BatchSource,
    E: Executor,
{
    let mut applied = 0;
    let mut committed_rows = 0;

    while let Some(sql) = statements.next_statement().await? {
        destination.execute_and_commit(&sql).await.with_context(|| {
            format!(
                "Failed to apply batch {} ({} rows committed before it)",
                applied + 1,
                committed_rows
            )
        })?;
        applied += 1;
        committed_rows = statements.rows_rendered();
        progress.set_message(format!("{} rows copied", committed_rows));
        progress.tick();
    }

    Ok(applied)
}

/// Migrate the selected columns of one table
///
/// Steps, in order:
/// 1. count NULLs per column and append findings to `log`
/// 2. synthesize and execute the CREATE TABLE statement
/// 3. stream rows in batches of `options.batch_size`, one INSERT per batch
pub async fn migrate_table<E: Executor>(
    source: &mut Client,
    destination: &mut E,
    table: &str,
    columns: &[String],
    options: &MigrationOptions,
    log: &mut dyn RunLog,
) -> Result<TableReport> {
    if columns.is_empty() {
        bail!(
            "No columns selected for table '{}'",
            sanitize_identifier(table)
        );
    }
    check_batch_size(options.batch_size)?;

    let flagged = process_nulls(source, table, columns, log).await?;
    if flagged > 0 {
        tracing::info!("  {} column(s) with NULL values recorded in run log", flagged);
    }

    let create_sql =
        generate_create_table_statement(source, table, columns, options.create_mode).await?;
    destination
        .execute_and_commit(&create_sql)
        .await
        .with_context(|| {
            format!(
                "Failed to create table '{}' on destination",
                sanitize_identifier(table)
            )
        })?;
    tracing::info!("✓ Created table '{}' on destination", sanitize_identifier(table));

    let mut statements = stream_inserts(source, table, columns, options.batch_size).await?;

    let progress = row_progress(table)?;
    let applied = apply_statements(&mut statements, destination, &progress).await;
    progress.finish_and_clear();
    let applied = applied?;

    let rows = statements.rows_rendered();
    statements.into_source().close().await?;

    tracing::info!(
        "✓ Copied {} row(s) into '{}' in {} batch(es)",
        rows,
        sanitize_identifier(table),
        applied
    );

    Ok(TableReport {
        table: table.to_string(),
        columns: columns.to_vec(),
        rows,
        statements: applied,
    })
}

/// Source-side operations the interactive run drives, one table at a time
#[allow(async_fn_in_trait)]
pub trait TableMigrator {
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    async fn list_columns(&mut self, table: &str) -> Result<Vec<String>>;

    async fn migrate_table(
        &mut self,
        table: &str,
        columns: &[String],
        options: &MigrationOptions,
        log: &mut dyn RunLog,
    ) -> Result<TableReport>;
}

/// PostgreSQL source paired with a destination executor
pub struct PostgresMigrator<'a, E> {
    source: &'a mut Client,
    destination: &'a mut E,
}

impl<'a, E: Executor> PostgresMigrator<'a, E> {
    pub fn new(source: &'a mut Client, destination: &'a mut E) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl<E: Executor> TableMigrator for PostgresMigrator<'_, E> {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        list_tables(&*self.source)
            .await
            .context("Failed to list tables on source")
    }

    async fn list_columns(&mut self, table: &str) -> Result<Vec<String>> {
        list_columns(&*self.source, table).await
    }

    async fn migrate_table(
        &mut self,
        table: &str,
        columns: &[String],
        options: &MigrationOptions,
        log: &mut dyn RunLog,
    ) -> Result<TableReport> {
        migrate_table(
            &mut *self.source,
            &mut *self.destination,
            table,
            columns,
            options,
            log,
        )
        .await
    }
}

/// Run a full interactive migration
///
/// Lists the source tables, asks which to migrate, then for each table asks
/// which columns to migrate and copies them. Tables for which no column is
/// chosen are skipped.
pub async fn migrate<E, P>(
    source: &mut Client,
    destination: &mut E,
    selector: &mut P,
    options: &MigrationOptions,
    log: &mut dyn RunLog,
) -> Result<Vec<TableReport>>
where
    E: Executor,
    P: SelectionProvider + ?Sized,
{
    let mut migrator = PostgresMigrator::new(source, destination);
    run_selected(&mut migrator, selector, options, log).await
}

/// Drive table and column selection over any [`TableMigrator`]
///
/// Stops at the first failing table; tables finished before it stay migrated.
pub async fn run_selected<M, P>(
    migrator: &mut M,
    selector: &mut P,
    options: &MigrationOptions,
    log: &mut dyn RunLog,
) -> Result<Vec<TableReport>>
where
    M: TableMigrator,
    P: SelectionProvider + ?Sized,
{
    check_batch_size(options.batch_size)?;

    tracing::info!("Discovering tables on source...");
    let tables = migrator.list_tables().await?;

    if tables.is_empty() {
        tracing::warn!("⚠ No tables found in the source '{}' schema", SOURCE_SCHEMA);
        return Ok(Vec::new());
    }
    tracing::info!("✓ Found {} table(s)", tables.len());

    let tables = ask_user_to_select(selector, "tables", &tables)?;
    let mut reports = Vec::with_capacity(tables.len());

    for table in &tables {
        println!();
        println!("{}", "=".repeat(10));
        println!("Starting migration for {} table.", table);

        let columns = migrator.list_columns(table).await?;
        let columns = ask_user_to_select(selector, "columns", &columns)?;

        if columns.is_empty() {
            tracing::warn!(
                "⚠ No columns selected for '{}', skipping",
                sanitize_identifier(table)
            );
            println!("{}", "=".repeat(10));
            continue;
        }

        let report = migrator
            .migrate_table(table, &columns, options, log)
            .await?;
        reports.push(report);

        println!("Migration for {} table is successful.", table);
        println!("{}", "=".repeat(10));
    }

    Ok(reports)
}

fn row_progress(table: &str) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {prefix}: {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_prefix(sanitize_identifier(table));
    progress.set_message("0 rows copied");
    progress.enable_steady_tick(Duration::from_millis(200));
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactive::{ScriptedAnswer, ScriptedSelector, SelectionMode};
    use crate::migration::nulls::MemoryRunLog;
    use crate::migration::rows::{SqlValue, MAX_BATCH_SIZE};

    struct MemorySource {
        rows: Vec<Vec<SqlValue>>,
        position: usize,
    }

    impl BatchSource for MemorySource {
        async fn fetch_batch(&mut self, max_rows: usize) -> Result<Vec<Vec<SqlValue>>> {
            let end = (self.position + max_rows).min(self.rows.len());
            let batch = self.rows[self.position..end].to_vec();
            self.position = end;
            Ok(batch)
        }
    }

    /// Records statements; fails once `fail_after` statements succeeded
    #[derive(Default)]
    struct RecordingExecutor {
        committed: Vec<String>,
        fail_after: Option<usize>,
    }

    impl Executor for RecordingExecutor {
        async fn execute_and_commit(&mut self, statement: &str) -> Result<()> {
            if Some(self.committed.len()) == self.fail_after {
                bail!("destination rejected statement");
            }
            self.committed.push(statement.to_string());
            Ok(())
        }
    }

    fn rows(count: usize) -> Vec<Vec<SqlValue>> {
        (1..=count)
            .map(|i| vec![SqlValue::Number(i.to_string())])
            .collect()
    }

    fn statements(count: usize, batch_size: usize) -> InsertStatements<MemorySource> {
        let source = MemorySource {
            rows: rows(count),
            position: 0,
        };
        InsertStatements::new(source, "t", &["v".to_string()], batch_size).unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = MigrationOptions::default();
        assert_eq!(options.batch_size, 2);
        assert_eq!(options.create_mode, CreateMode::Create);
    }

    #[tokio::test]
    async fn test_apply_statements_executes_in_order() {
        let mut inserts = statements(5, 2);
        let mut destination = RecordingExecutor::default();

        let applied = apply_statements(&mut inserts, &mut destination, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(applied, 3);
        assert_eq!(
            destination.committed,
            vec![
                "INSERT INTO \"t\" (\"v\") VALUES\n(1),\n(2);",
                "INSERT INTO \"t\" (\"v\") VALUES\n(3),\n(4);",
                "INSERT INTO \"t\" (\"v\") VALUES\n(5);",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_leaves_earlier_batches_committed() {
        let mut inserts = statements(7, 2);
        let mut destination = RecordingExecutor {
            committed: Vec::new(),
            fail_after: Some(2),
        };

        let err = apply_statements(&mut inserts, &mut destination, &ProgressBar::hidden())
            .await
            .unwrap_err();

        // Two batches committed, third failed, fourth never attempted
        assert_eq!(destination.committed.len(), 2);
        assert_eq!(inserts.statements_rendered(), 3);
        let message = format!("{:#}", err);
        assert!(message.contains("batch 3"));
        assert!(message.contains("4 rows committed before it"));
        assert!(message.contains("destination rejected statement"));
    }

    #[tokio::test]
    async fn test_apply_statements_empty_source() {
        let mut inserts = statements(0, 2);
        let mut destination = RecordingExecutor::default();

        let applied = apply_statements(&mut inserts, &mut destination, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(applied, 0);
        assert!(destination.committed.is_empty());
    }

    /// In-memory source catalog; records every table it is asked to migrate
    #[derive(Default)]
    struct FakeMigrator {
        tables: Vec<(String, Vec<String>)>,
        migrated: Vec<(String, Vec<String>)>,
        fail_on: Option<String>,
    }

    impl FakeMigrator {
        fn with_tables(tables: &[(&str, &[&str])]) -> Self {
            Self {
                tables: tables
                    .iter()
                    .map(|(t, cols)| (t.to_string(), cols.iter().map(|c| c.to_string()).collect()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl TableMigrator for FakeMigrator {
        async fn list_tables(&mut self) -> Result<Vec<String>> {
            Ok(self.tables.iter().map(|(t, _)| t.clone()).collect())
        }

        async fn list_columns(&mut self, table: &str) -> Result<Vec<String>> {
            self.tables
                .iter()
                .find(|(t, _)| t == table)
                .map(|(_, cols)| cols.clone())
                .context("unknown table")
        }

        async fn migrate_table(
            &mut self,
            table: &str,
            columns: &[String],
            _options: &MigrationOptions,
            _log: &mut dyn RunLog,
        ) -> Result<TableReport> {
            if self.fail_on.as_deref() == Some(table) {
                bail!("relation \"{}\" already exists", table);
            }
            self.migrated.push((table.to_string(), columns.to_vec()));
            Ok(TableReport {
                table: table.to_string(),
                columns: columns.to_vec(),
                rows: 0,
                statements: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_run_selected_migrates_chosen_tables_and_columns() {
        let mut migrator =
            FakeMigrator::with_tables(&[("items", &["sku", "qty"]), ("orders", &["id", "note"])]);
        let mut selector = ScriptedSelector::new([
            ScriptedAnswer::Mode(SelectionMode::All),
            ScriptedAnswer::Mode(SelectionMode::Exclude),
            ScriptedAnswer::Subset("qty".to_string()),
            ScriptedAnswer::Mode(SelectionMode::All),
        ]);
        let mut log = MemoryRunLog::new();

        let reports = run_selected(
            &mut migrator,
            &mut selector,
            &MigrationOptions::default(),
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(
            migrator.migrated,
            vec![
                ("items".to_string(), vec!["sku".to_string()]),
                ("orders".to_string(), vec!["id".to_string(), "note".to_string()]),
            ]
        );
        assert_eq!(selector.remaining(), 0);
    }

    #[tokio::test]
    async fn test_run_selected_skips_table_without_columns() {
        let mut migrator =
            FakeMigrator::with_tables(&[("items", &["sku"]), ("orders", &["id"])]);
        let mut selector = ScriptedSelector::new([
            ScriptedAnswer::Mode(SelectionMode::All),
            ScriptedAnswer::Mode(SelectionMode::Include),
            ScriptedAnswer::Subset(String::new()),
            ScriptedAnswer::Mode(SelectionMode::All),
        ]);
        let mut log = MemoryRunLog::new();

        let reports = run_selected(
            &mut migrator,
            &mut selector,
            &MigrationOptions::default(),
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].table, "orders");
        assert_eq!(migrator.migrated.len(), 1);
    }

    #[tokio::test]
    async fn test_run_selected_with_no_tables_asks_nothing() {
        let mut migrator = FakeMigrator::default();
        let mut selector = ScriptedSelector::default();
        let mut log = MemoryRunLog::new();

        let reports = run_selected(
            &mut migrator,
            &mut selector,
            &MigrationOptions::default(),
            &mut log,
        )
        .await
        .unwrap();

        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_run_selected_stops_at_failing_table() {
        let mut migrator = FakeMigrator::with_tables(&[
            ("a", &["x"]),
            ("b", &["x"]),
            ("c", &["x"]),
        ]);
        migrator.fail_on = Some("b".to_string());
        let mut selector = ScriptedSelector::new([
            ScriptedAnswer::Mode(SelectionMode::All),
            ScriptedAnswer::Mode(SelectionMode::All),
            ScriptedAnswer::Mode(SelectionMode::All),
            ScriptedAnswer::Mode(SelectionMode::All),
        ]);
        let mut log = MemoryRunLog::new();

        let err = run_selected(
            &mut migrator,
            &mut selector,
            &MigrationOptions::default(),
            &mut log,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(migrator.migrated.len(), 1);
        // Column prompt for "c" was never reached
        assert_eq!(selector.remaining(), 1);
    }

    #[tokio::test]
    async fn test_run_selected_rejects_oversized_batch_before_listing() {
        let mut migrator = FakeMigrator::with_tables(&[("a", &["x"])]);
        let mut selector = ScriptedSelector::default();
        let mut log = MemoryRunLog::new();
        let options = MigrationOptions {
            batch_size: MAX_BATCH_SIZE + 1,
            create_mode: CreateMode::Create,
        };

        let result = run_selected(&mut migrator, &mut selector, &options, &mut log).await;

        assert!(result.is_err());
        assert!(migrator.migrated.is_empty());
    }

    #[test]
    fn test_row_progress_template_is_valid() {
        let progress = row_progress("orders").unwrap();
        progress.finish_and_clear();
    }
}
