// ABOUTME: CREATE TABLE synthesis from introspected column metadata
// ABOUTME: Filters to the selected columns and renders destination DDL text

use crate::migration::catalog::{describe_columns, ColumnDescriptor};
use crate::utils::{quote_ident, sanitize_identifier};
use anyhow::{bail, Result};
use serde::Deserialize;
use tokio_postgres::Client;

/// Statement head used for the synthesized table
///
/// This is a textual substitution only. Declared types pass through unchanged
/// in every mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    /// `CREATE TABLE`
    #[default]
    Create,
    /// `CREATE TABLE IF NOT EXISTS`
    IfNotExists,
    /// `CREATE OR REPLACE TABLE`, for destinations that support it
    OrReplace,
}

impl CreateMode {
    pub fn statement_head(self) -> &'static str {
        match self {
            CreateMode::Create => "CREATE TABLE",
            CreateMode::IfNotExists => "CREATE TABLE IF NOT EXISTS",
            CreateMode::OrReplace => "CREATE OR REPLACE TABLE",
        }
    }
}

/// Render a CREATE TABLE statement for the selected columns of a table
///
/// Columns appear in introspection order, not in the order of `selected`.
///
/// # Errors
///
/// - a selected column is not among `columns`
/// - no column remains after filtering
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::migration::catalog::ColumnDescriptor;
/// # use pg_table_migrator::migration::ddl::{render_create_table, CreateMode};
/// let columns = vec![
///     ColumnDescriptor {
///         name: "id".into(),
///         data_type: "integer".into(),
///         type_name: "int4".into(),
///         not_null: true,
///     },
///     ColumnDescriptor {
///         name: "note".into(),
///         data_type: "text".into(),
///         type_name: "text".into(),
///         not_null: false,
///     },
/// ];
/// let selected = vec!["note".to_string(), "id".to_string()];
/// let sql = render_create_table("orders", &columns, &selected, CreateMode::Create)?;
/// assert_eq!(
///     sql,
///     "CREATE TABLE \"orders\" (\n    \"id\" integer NOT NULL,\n    \"note\" text\n);"
/// );
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn render_create_table(
    table: &str,
    columns: &[ColumnDescriptor],
    selected: &[String],
    mode: CreateMode,
) -> Result<String> {
    if let Some(unknown) = selected
        .iter()
        .find(|name| !columns.iter().any(|c| &c.name == *name))
    {
        bail!(
            "Column '{}' does not exist in table '{}'",
            sanitize_identifier(unknown),
            sanitize_identifier(table)
        );
    }

    let definitions: Vec<String> = columns
        .iter()
        .filter(|c| selected.contains(&c.name))
        .map(|c| {
            let mut definition = format!("    {} {}", quote_ident(&c.name), c.data_type);
            if c.not_null {
                definition.push_str(" NOT NULL");
            }
            definition
        })
        .collect();

    if definitions.is_empty() {
        bail!(
            "No columns selected for table '{}'",
            sanitize_identifier(table)
        );
    }

    Ok(format!(
        "{} {} (\n{}\n);",
        mode.statement_head(),
        quote_ident(table),
        definitions.join(",\n")
    ))
}

/// Introspect a source table and synthesize its CREATE TABLE statement
pub async fn generate_create_table_statement(
    client: &Client,
    table: &str,
    selected: &[String],
    mode: CreateMode,
) -> Result<String> {
    let columns = describe_columns(client, table).await?;
    let statement = render_create_table(table, &columns, selected, mode)?;

    tracing::debug!(
        "Synthesized {} for '{}' ({} of {} columns)",
        mode.statement_head(),
        sanitize_identifier(table),
        selected.len(),
        columns.len()
    );

    Ok(statement)
}
