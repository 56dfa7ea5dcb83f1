// ABOUTME: Statement execution against the destination database
// ABOUTME: Applies each DDL/DML statement on its own and commits it immediately

use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Applies generated statements to the destination
///
/// Every call is its own unit of work. Nothing groups statements together, so
/// a failure leaves earlier statements committed.
#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn execute_and_commit(&mut self, statement: &str) -> Result<()>;
}

impl Executor for Client {
    /// Runs the statement through the simple-query protocol outside any
    /// explicit transaction, so the server commits it on completion.
    async fn execute_and_commit(&mut self, statement: &str) -> Result<()> {
        self.batch_execute(statement).await.with_context(|| {
            format!(
                "Failed to execute statement on destination: {}",
                preview(statement)
            )
        })
    }
}

/// First line of a statement, shortened for error messages
fn preview(statement: &str) -> String {
    let first_line = statement.lines().next().unwrap_or_default();
    if first_line.chars().count() > 80 {
        let head: String = first_line.chars().take(80).collect();
        format!("{}...", head)
    } else {
        first_line.to_string()
    }
}
