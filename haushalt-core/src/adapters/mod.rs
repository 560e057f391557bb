//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Repository port
//! - an in-memory Repository for tests and throwaway runs

pub mod duckdb;
pub mod memory;
