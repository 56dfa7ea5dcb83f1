// ABOUTME: Catalog introspection for the source database
// ABOUTME: Lists public tables, their columns, and per-column type and nullability

use crate::utils::sanitize_identifier;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Schema whose tables are offered for migration
pub const SOURCE_SCHEMA: &str = "public";

/// Introspected metadata for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type as the source renders it, e.g. `character varying(40)`
    pub data_type: String,
    /// Base type name from `pg_type`, e.g. `varchar`, `int4`
    pub type_name: String,
    pub not_null: bool,
}

/// List all base tables in the `public` schema, ordered by name
///
/// Partitions are left out; their rows are read through the partitioned
/// parent.
pub async fn list_tables(client: &Client) -> Result<Vec<String>> {
    let rows = client
        .query(
            "SELECT c.relname
             FROM pg_catalog.pg_class c
             JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
             WHERE n.nspname = $1
               AND c.relkind IN ('r', 'p')
               AND NOT c.relispartition
             ORDER BY c.relname",
            &[&SOURCE_SCHEMA],
        )
        .await
        .context("Failed to list tables")?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// List the column names of a table in declaration order
pub async fn list_columns(client: &Client, table: &str) -> Result<Vec<String>> {
    let columns = describe_columns(client, table).await?;
    Ok(columns.into_iter().map(|c| c.name).collect())
}

/// Describe every column of a table in declaration order
///
/// Returns the declared type text (`format_type`, which keeps length and
/// precision modifiers), the base type name, and the NOT NULL constraint.
pub async fn describe_columns(client: &Client, table: &str) -> Result<Vec<ColumnDescriptor>> {
    let rows = client
        .query(
            "SELECT
                a.attname,
                pg_catalog.format_type(a.atttypid, a.atttypmod),
                t.typname,
                a.attnotnull
             FROM pg_catalog.pg_attribute a
             JOIN pg_catalog.pg_class c ON a.attrelid = c.oid
             JOIN pg_catalog.pg_namespace n ON c.relnamespace = n.oid
             JOIN pg_catalog.pg_type t ON a.atttypid = t.oid
             WHERE n.nspname = $1
               AND c.relname = $2
               AND a.attnum > 0
               AND NOT a.attisdropped
             ORDER BY a.attnum",
            &[&SOURCE_SCHEMA, &table],
        )
        .await
        .with_context(|| {
            format!(
                "Failed to get columns for table '{}'",
                sanitize_identifier(table)
            )
        })?;

    let columns = rows
        .iter()
        .map(|row| ColumnDescriptor {
            name: row.get(0),
            data_type: row.get(1),
            type_name: row.get(2),
            not_null: row.get(3),
        })
        .collect();

    Ok(columns)
}
