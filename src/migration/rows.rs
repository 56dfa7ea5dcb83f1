// ABOUTME: Batch-wise row streaming from the source into INSERT statement text
// ABOUTME: Reads through a server-side portal and renders values with a typed literal serializer

use crate::migration::catalog::{describe_columns, SOURCE_SCHEMA};
use crate::utils::{quote_ident, quote_literal, quote_qualified, sanitize_identifier};
use anyhow::{bail, Context, Result};
use tokio_postgres::{Client, Portal, Transaction};

/// Rows fetched per INSERT statement unless overridden
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Largest batch a single portal fetch can request
pub const MAX_BATCH_SIZE: usize = i32::MAX as usize;

/// Reject batch sizes a portal fetch cannot honor
///
/// A fetch of 0 rows means "all rows", so 0 is refused along with anything
/// beyond `i32::MAX`.
pub fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        bail!("Batch size must be at least 1");
    }
    if batch_size > MAX_BATCH_SIZE {
        bail!("Batch size must be at most {}", MAX_BATCH_SIZE);
    }
    Ok(())
}

/// How a column's values are written as SQL literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Numeric,
    Text,
}

impl ValueKind {
    /// Classify a PostgreSQL base type name (`pg_type.typname`)
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "bool" => ValueKind::Boolean,
            "int2" | "int4" | "int8" | "float4" | "float8" | "numeric" | "oid" => {
                ValueKind::Numeric
            }
            _ => ValueKind::Text,
        }
    }
}

/// One value of one row, ready to be written as a literal
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    /// Numeric text exactly as the source printed it
    Number(String),
    Text(String),
}

impl SqlValue {
    /// Build a value from the source's text output for a column
    ///
    /// `None` is SQL NULL. A text value such as `"None"` or `"NULL"` stays text.
    pub fn from_text(kind: ValueKind, text: Option<String>) -> Self {
        let Some(text) = text else {
            return SqlValue::Null;
        };

        match kind {
            ValueKind::Boolean => match text.as_str() {
                "t" | "true" => SqlValue::Bool(true),
                "f" | "false" => SqlValue::Bool(false),
                _ => SqlValue::Text(text),
            },
            ValueKind::Numeric => SqlValue::Number(text),
            ValueKind::Text => SqlValue::Text(text),
        }
    }

    /// Render as a destination SQL literal
    ///
    /// Numbers that are not finite (`NaN`, `Infinity`) are quoted so the
    /// destination parses them as typed input rather than identifiers.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "TRUE".to_string(),
            SqlValue::Bool(false) => "FALSE".to_string(),
            SqlValue::Number(n) => {
                if n.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                    n.clone()
                } else {
                    quote_literal(n)
                }
            }
            SqlValue::Text(s) => quote_literal(s),
        }
    }
}

/// Render one multi-row INSERT statement for a batch
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::migration::rows::{render_insert, SqlValue};
/// let columns = vec!["id".to_string(), "note".to_string()];
/// let rows = vec![
///     vec![SqlValue::Number("1".into()), SqlValue::Text("a".into())],
///     vec![SqlValue::Number("2".into()), SqlValue::Null],
/// ];
/// assert_eq!(
///     render_insert("orders", &columns, &rows),
///     "INSERT INTO \"orders\" (\"id\", \"note\") VALUES\n(1, 'a'),\n(2, NULL);"
/// );
/// ```
pub fn render_insert(table: &str, columns: &[String], rows: &[Vec<SqlValue>]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let literals: Vec<String> = row.iter().map(SqlValue::to_sql_literal).collect();
            format!("({})", literals.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES\n{};",
        quote_ident(table),
        column_list.join(", "),
        tuples.join(",\n")
    )
}

/// Build the cursor query; every column is read in its text form
pub fn select_query(table: &str, columns: &[String]) -> String {
    let projections: Vec<String> = columns
        .iter()
        .map(|c| format!("{}::text", quote_ident(c)))
        .collect();

    format!(
        "SELECT {} FROM {}",
        projections.join(", "),
        quote_qualified(SOURCE_SCHEMA, table)
    )
}

/// A source of row batches
///
/// An empty batch means the source is exhausted.
#[allow(async_fn_in_trait)]
pub trait BatchSource {
    async fn fetch_batch(&mut self, max_rows: usize) -> Result<Vec<Vec<SqlValue>>>;
}

/// Rows read through a portal (server-side cursor) on the source
///
/// The portal lives inside a read-only transaction that is held open until
/// [`PortalSource::close`] or drop.
pub struct PortalSource<'a> {
    transaction: Transaction<'a>,
    portal: Portal,
    kinds: Vec<ValueKind>,
}

impl<'a> PortalSource<'a> {
    /// Open a cursor selecting exactly `columns` from `table`
    pub async fn open(client: &'a mut Client, table: &str, columns: &[String]) -> Result<Self> {
        let described = describe_columns(client, table).await?;
        let kinds = columns
            .iter()
            .map(|name| {
                described
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| ValueKind::from_type_name(&c.type_name))
                    .with_context(|| {
                        format!(
                            "Column '{}' does not exist in table '{}'",
                            sanitize_identifier(name),
                            sanitize_identifier(table)
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let transaction = client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .context("Failed to start read-only transaction on source")?;

        let query = select_query(table, columns);
        let statement = transaction.prepare(&query).await.with_context(|| {
            format!(
                "Failed to prepare row query for table '{}'",
                sanitize_identifier(table)
            )
        })?;
        let portal = transaction
            .bind(&statement, &[])
            .await
            .with_context(|| {
                format!(
                    "Failed to open cursor on table '{}'",
                    sanitize_identifier(table)
                )
            })?;

        Ok(Self {
            transaction,
            portal,
            kinds,
        })
    }

    /// Close the cursor and end the read-only transaction
    pub async fn close(self) -> Result<()> {
        self.transaction
            .commit()
            .await
            .context("Failed to close source cursor")
    }
}

impl BatchSource for PortalSource<'_> {
    async fn fetch_batch(&mut self, max_rows: usize) -> Result<Vec<Vec<SqlValue>>> {
        let max_rows = i32::try_from(max_rows).context("Batch size too large")?;
        let rows = self
            .transaction
            .query_portal(&self.portal, max_rows)
            .await
            .context("Failed to fetch rows from source cursor")?;

        let mut batch = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(self.kinds.len());
            for (idx, &kind) in self.kinds.iter().enumerate() {
                let text: Option<String> = row
                    .try_get(idx)
                    .with_context(|| format!("Failed to read column {} of fetched row", idx))?;
                values.push(SqlValue::from_text(kind, text));
            }
            batch.push(values);
        }

        Ok(batch)
    }
}

/// Lazy, finite sequence of INSERT statements, one per batch
///
/// The sequence cannot be restarted: after the first empty fetch every call
/// to [`InsertStatements::next_statement`] returns `None` without touching the
/// source.
pub struct InsertStatements<S> {
    source: S,
    table: String,
    columns: Vec<String>,
    batch_size: usize,
    exhausted: bool,
    rows_rendered: u64,
    statements_rendered: u64,
}

impl<S: BatchSource> InsertStatements<S> {
    pub fn new(source: S, table: &str, columns: &[String], batch_size: usize) -> Result<Self> {
        check_batch_size(batch_size)?;
        if columns.is_empty() {
            bail!(
                "No columns selected for table '{}'",
                sanitize_identifier(table)
            );
        }

        Ok(Self {
            source,
            table: table.to_string(),
            columns: columns.to_vec(),
            batch_size,
            exhausted: false,
            rows_rendered: 0,
            statements_rendered: 0,
        })
    }

    /// Fetch the next batch and render it, or `None` once the source is empty
    pub async fn next_statement(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }

        let batch = self.source.fetch_batch(self.batch_size).await?;
        if batch.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        let statement = render_insert(&self.table, &self.columns, &batch);
        self.rows_rendered += batch.len() as u64;
        self.statements_rendered += 1;

        tracing::debug!(
            "Rendered batch {} ({} rows, {} bytes) for '{}'",
            self.statements_rendered,
            batch.len(),
            statement.len(),
            sanitize_identifier(&self.table)
        );

        Ok(Some(statement))
    }

    pub fn rows_rendered(&self) -> u64 {
        self.rows_rendered
    }

    pub fn statements_rendered(&self) -> u64 {
        self.statements_rendered
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

/// Open a cursor on the source and wrap it in an INSERT statement sequence
pub async fn stream_inserts<'a>(
    client: &'a mut Client,
    table: &str,
    columns: &[String],
    batch_size: usize,
) -> Result<InsertStatements<PortalSource<'a>>> {
    check_batch_size(batch_size)?;
    let source = PortalSource::open(client, table, columns).await?;
    InsertStatements::new(source, table, columns, batch_size)
}
