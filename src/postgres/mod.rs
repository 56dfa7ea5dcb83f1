// ABOUTME: PostgreSQL connection module
// ABOUTME: Re-exports connection parameters and connect helpers

pub mod connection;

pub use connection::{connect, connect_url, ConnectionParams};
