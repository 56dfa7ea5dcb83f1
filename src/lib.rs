// ABOUTME: Library module for pg-table-migrator
// ABOUTME: Exports catalog, selection, synthesis, and streaming for the binary and tests

pub mod config;
pub mod interactive;
pub mod migration;
pub mod postgres;
pub mod utils;
