// ABOUTME: Migration pipeline module
// ABOUTME: Catalog reading, DDL synthesis, NULL auditing, row streaming, and statement execution

pub mod catalog;
pub mod ddl;
pub mod executor;
pub mod nulls;
pub mod rows;
pub mod run;

pub use catalog::{describe_columns, list_columns, list_tables, ColumnDescriptor, SOURCE_SCHEMA};
pub use ddl::{generate_create_table_statement, render_create_table, CreateMode};
pub use executor::Executor;
pub use nulls::{process_nulls, report_nulls, FileRunLog, MemoryRunLog, RunLog};
pub use rows::{
    check_batch_size, render_insert, stream_inserts, BatchSource, InsertStatements, PortalSource,
    SqlValue, ValueKind, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE,
};
pub use run::{
    apply_statements, migrate, migrate_table, run_selected, MigrationOptions, PostgresMigrator,
    TableMigrator, TableReport,
};
