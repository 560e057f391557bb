//! Log database migrations - embedded SQL files
//!
//! Same layout as the main database migrations, applied to logs.duckdb.

/// All log migrations, in order.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
