//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary with include_str!.
//! Each migration is a tuple of (name, sql_content), applied in order.

/// All migrations for the main database.
///
/// When adding a migration, create `NNN_description.sql` and append it here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_settings.sql", include_str!("001_settings.sql")),
    ("002_transactions.sql", include_str!("002_transactions.sql")),
];
