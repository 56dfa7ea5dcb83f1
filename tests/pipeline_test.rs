// ABOUTME: Pipeline tests over the public API without any database
// ABOUTME: Drives selection, DDL synthesis, NULL reporting, and batch rendering with in-memory doubles

use anyhow::Result;
use pg_table_migrator::interactive::{
    ask_user_to_select, ScriptedAnswer, ScriptedSelector, SelectionMode,
};
use pg_table_migrator::migration::{
    report_nulls, render_create_table, BatchSource, ColumnDescriptor, CreateMode,
    InsertStatements, MemoryRunLog, SqlValue, ValueKind,
};

/// Batch source over rows given as source text output, like a portal would return
struct TextRows {
    kinds: Vec<ValueKind>,
    rows: Vec<Vec<Option<&'static str>>>,
    position: usize,
}

impl BatchSource for TextRows {
    async fn fetch_batch(&mut self, max_rows: usize) -> Result<Vec<Vec<SqlValue>>> {
        let end = (self.position + max_rows).min(self.rows.len());
        let batch: Vec<Vec<SqlValue>> = self.rows[self.position..end]
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.kinds)
                    .map(|(text, &kind)| SqlValue::from_text(kind, text.map(String::from)))
                    .collect()
            })
            .collect();
        self.position = end;
        Ok(batch)
    }
}

fn orders_catalog() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            type_name: "int4".to_string(),
            not_null: true,
        },
        ColumnDescriptor {
            name: "note".to_string(),
            data_type: "text".to_string(),
            type_name: "text".to_string(),
            not_null: false,
        },
        ColumnDescriptor {
            name: "paid".to_string(),
            data_type: "boolean".to_string(),
            type_name: "bool".to_string(),
            not_null: false,
        },
    ]
}

#[tokio::test]
async fn test_selected_columns_flow_through_ddl_and_inserts() {
    let catalog = orders_catalog();
    let column_names: Vec<String> = catalog.iter().map(|c| c.name.clone()).collect();

    let mut selector = ScriptedSelector::new([
        ScriptedAnswer::Mode(SelectionMode::Exclude),
        ScriptedAnswer::Subset("paid".to_string()),
    ]);
    let selected = ask_user_to_select(&mut selector, "columns", &column_names).unwrap();
    assert_eq!(selected, vec!["id", "note"]);

    let create = render_create_table("orders", &catalog, &selected, CreateMode::Create).unwrap();
    assert_eq!(
        create,
        "CREATE TABLE \"orders\" (\n    \"id\" integer NOT NULL,\n    \"note\" text\n);"
    );

    let source = TextRows {
        kinds: vec![ValueKind::Numeric, ValueKind::Text],
        rows: vec![
            vec![Some("1"), Some("a")],
            vec![Some("2"), None],
            vec![Some("3"), Some("b")],
        ],
        position: 0,
    };
    let mut inserts = InsertStatements::new(source, "orders", &selected, 2).unwrap();

    let first = inserts.next_statement().await.unwrap().unwrap();
    let second = inserts.next_statement().await.unwrap().unwrap();
    assert!(inserts.next_statement().await.unwrap().is_none());

    assert_eq!(
        first,
        "INSERT INTO \"orders\" (\"id\", \"note\") VALUES\n(1, 'a'),\n(2, NULL);"
    );
    assert_eq!(
        second,
        "INSERT INTO \"orders\" (\"id\", \"note\") VALUES\n(3, 'b');"
    );
}

#[tokio::test]
async fn test_none_string_survives_rendering() {
    let source = TextRows {
        kinds: vec![ValueKind::Text, ValueKind::Boolean],
        rows: vec![
            vec![Some("None"), Some("t")],
            vec![None, Some("f")],
            vec![Some("None"), None],
        ],
        position: 0,
    };
    let columns = vec!["note".to_string(), "paid".to_string()];
    let mut inserts = InsertStatements::new(source, "orders", &columns, 10).unwrap();

    let sql = inserts.next_statement().await.unwrap().unwrap();

    assert_eq!(
        sql,
        "INSERT INTO \"orders\" (\"note\", \"paid\") VALUES\n\
         ('None', TRUE),\n\
         (NULL, FALSE),\n\
         ('None', NULL);"
    );
}

#[test]
fn test_null_report_for_selected_columns() {
    let mut log = MemoryRunLog::new();
    let columns = vec!["id".to_string(), "note".to_string()];

    report_nulls("orders", &columns, &[0, 1], &mut log).unwrap();

    assert_eq!(
        log.lines(),
        &["THERE ARE 1 NULL VALUES IN note COLUMN IN TABLE orders!".to_string()]
    );
}
