// ABOUTME: Utility functions for SQL text rendering and error classification
// ABOUTME: Provides identifier/literal quoting, display sanitizing, and database error detection

/// Quote a SQL identifier (table or column name) for use in generated SQL
///
/// The identifier is always wrapped in double quotes and any embedded double
/// quote is doubled, so names with mixed case, spaces, or reserved words keep
/// their exact catalog spelling on the destination.
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::utils::quote_ident;
/// assert_eq!(quote_ident("orders"), "\"orders\"");
/// assert_eq!(quote_ident("Order Lines"), "\"Order Lines\"");
/// assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
/// ```
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote a schema-qualified table name
///
/// Generated queries name the schema explicitly so they read the same table
/// the catalog described, whatever the session's `search_path` says.
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::utils::quote_qualified;
/// assert_eq!(quote_qualified("public", "orders"), "\"public\".\"orders\"");
/// ```
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Quote a string as a SQL literal
///
/// Embedded single quotes are doubled. Backslashes are left alone, matching
/// `standard_conforming_strings = on`.
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::utils::quote_literal;
/// assert_eq!(quote_literal("abc"), "'abc'");
/// assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Sanitize an identifier (table name, column name) for display
///
/// Removes control characters and limits length to prevent log injection and
/// keep error messages readable.
///
/// **Note**: This is for display purposes only. Generated SQL goes through
/// [`quote_ident`].
///
/// # Examples
///
/// ```
/// # use pg_table_migrator::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\x00name"), "tablename");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
///
/// let long_name = "a".repeat(200);
/// assert_eq!(sanitize_identifier(&long_name).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Check whether an error originated in either database
///
/// Walks the whole `anyhow` chain looking for a `tokio_postgres::Error`.
/// Context layers added on the way up do not hide the database error.
pub fn is_database_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<tokio_postgres::Error>().is_some())
}
