//! Migration service - applies embedded schema migrations
//!
//! Each applied migration is recorded in `sys_migrations`, so running the
//! service again is a no-op. The first entry of a migration list must be the
//! bootstrap migration that creates `sys_migrations` itself.

use anyhow::{anyhow, Result};
use duckdb::Connection;

/// Embedded migration list: (file name, SQL)
pub type Migrations = &'static [(&'static str, &'static str)];

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Applies a migration list to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: Migrations,
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection, migrations: Migrations) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations in order
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let (bootstrap_name, bootstrap_sql) = self
            .migrations
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Migration list is empty"))?;

        let mut newly_applied = Vec::new();
        if !self.migrations_table_exists()? {
            self.conn.execute_batch(bootstrap_sql)?;
            self.record_migration(bootstrap_name)?;
            newly_applied.push(bootstrap_name.to_string());
        }

        let applied = self.get_applied()?;
        let already_applied = applied.len() - newly_applied.len();

        for (name, sql) in self.migrations.iter().skip(1) {
            if !applied.iter().any(|a| a == name) {
                self.conn.execute_batch(sql)?;
                self.record_migration(name)?;
                newly_applied.push(name.to_string());
            }
        }

        Ok(MigrationResult {
            applied: newly_applied,
            already_applied,
        })
    }

    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of already applied migrations
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Names of migrations not yet applied
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = if self.migrations_table_exists()? {
            self.get_applied()?
        } else {
            Vec::new()
        };
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}
