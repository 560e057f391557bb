//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use duckdb::{params, params_from_iter, Connection, OptionalExt};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result as CoreResult};
use crate::domain::Transaction;
use crate::migrations::MIGRATIONS;
use crate::ports::{CategoryAssignment, Repository, SettingEntry, TransactionFilter};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const SELECT_TRANSACTION: &str = "SELECT transaction_id, account_id, CAST(amount AS VARCHAR),
        description, recipient_applicant, iban, transaction_date::VARCHAR, category,
        category_rule_id
 FROM sys_transactions";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
        || lower.contains("file is already open")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[haushalt] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        Ok(conn)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Apply pending migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    // === Settings ===

    pub fn settings_by_prefix(&self, prefix: &str) -> Result<Vec<SettingEntry>> {
        let conn = self.conn()?;
        // starts_with instead of LIKE: '_' in keys must not act as a wildcard
        let mut stmt = conn.prepare(
            "SELECT setting_id, setting_key, setting_value
             FROM sys_settings
             WHERE starts_with(setting_key, ?)
             ORDER BY setting_id",
        )?;
        let entries = stmt
            .query_map([prefix], row_to_setting)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn setting(&self, key: &str) -> Result<Option<SettingEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT setting_id, setting_key, setting_value FROM sys_settings
                 WHERE setting_key = ?",
                [key],
                row_to_setting,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn upsert_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        // Update first so an existing entry keeps its setting_id
        let updated = conn.execute(
            "UPDATE sys_settings SET setting_value = ?, updated_at = CURRENT_TIMESTAMP
             WHERE setting_key = ?",
            params![value, key],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO sys_settings (setting_key, setting_value) VALUES (?, ?)",
                params![key, value],
            )?;
        }
        Ok(())
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_settings WHERE setting_key = ?", [key])?;
        Ok(deleted > 0)
    }

    // === Transactions ===

    pub fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        // The amount column would round silently
        if !tx.has_storable_amount() {
            bail!("Amount {} of transaction {} has too many decimal places", tx.amount, tx.id);
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_transactions (transaction_id, account_id, amount, description,
                recipient_applicant, iban, transaction_date, category, category_rule_id)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, CAST(? AS DATE), ?, ?)
             ON CONFLICT (transaction_id) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                amount = EXCLUDED.amount,
                description = EXCLUDED.description,
                recipient_applicant = EXCLUDED.recipient_applicant,
                iban = EXCLUDED.iban,
                transaction_date = EXCLUDED.transaction_date,
                category = EXCLUDED.category,
                category_rule_id = EXCLUDED.category_rule_id,
                updated_at = now()",
            params![
                tx.id.to_string(),
                tx.account_id,
                tx.amount.to_string(),
                tx.description,
                tx.recipient_applicant,
                tx.iban,
                tx.transaction_date.format("%Y-%m-%d").to_string(),
                tx.category,
                tx.category_rule_id,
            ],
        )?;
        Ok(())
    }

    pub fn transaction_by_id(&self, id: &Uuid) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("{} WHERE transaction_id = ?", SELECT_TRANSACTION),
                [id.to_string()],
                TransactionRow::from_row,
            )
            .optional()?;
        row.map(TransactionRow::into_transaction).transpose()
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(account_id) = &filter.account_id {
            clauses.push("account_id = ?");
            values.push(account_id.clone());
        }
        if filter.uncategorized_only {
            clauses.push("category IS NULL");
        }

        let mut sql = SELECT_TRANSACTION.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY transaction_date, created_at, transaction_id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), TransactionRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    /// Write assignments inside one database transaction
    pub fn write_categories(&self, assignments: &[CategoryAssignment]) -> Result<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;
        let mut updated = 0;
        for assignment in assignments {
            updated += db_tx.execute(
                "UPDATE sys_transactions
                 SET category = ?, category_rule_id = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE transaction_id = ?",
                params![
                    assignment.category,
                    assignment.rule_id,
                    assignment.transaction_id.to_string(),
                ],
            )?;
        }
        db_tx.commit()?;
        Ok(updated)
    }
}

fn row_to_setting(row: &duckdb::Row) -> duckdb::Result<SettingEntry> {
    Ok(SettingEntry {
        id: row.get(0)?,
        key: row.get(1)?,
        value: row.get(2)?,
    })
}

/// Raw column values; parsed into a `Transaction` outside the row callback
struct TransactionRow {
    id: String,
    account_id: String,
    amount: String,
    description: Option<String>,
    recipient_applicant: Option<String>,
    iban: Option<String>,
    transaction_date: String,
    category: Option<String>,
    category_rule_id: Option<String>,
}

impl TransactionRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            amount: row.get(2)?,
            description: row.get(3)?,
            recipient_applicant: row.get(4)?,
            iban: row.get(5)?,
            transaction_date: row.get(6)?,
            category: row.get(7)?,
            category_rule_id: row.get(8)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        let id = Uuid::parse_str(&self.id)
            .with_context(|| format!("Invalid transaction id '{}'", self.id))?;
        let amount = Decimal::from_str(&self.amount)
            .with_context(|| format!("Invalid amount '{}' on transaction {}", self.amount, id))?;
        let transaction_date = NaiveDate::parse_from_str(&self.transaction_date, "%Y-%m-%d")
            .with_context(|| {
                format!("Invalid date '{}' on transaction {}", self.transaction_date, id)
            })?;

        Ok(Transaction {
            id,
            account_id: self.account_id,
            amount,
            description: self.description.unwrap_or_default(),
            recipient_applicant: self.recipient_applicant,
            iban: self.iban,
            transaction_date,
            category: self.category,
            category_rule_id: self.category_rule_id,
        })
    }
}

fn db_err(err: anyhow::Error) -> Error {
    Error::database(format!("{:#}", err))
}

impl Repository for DuckDbRepository {
    fn ensure_schema(&self) -> CoreResult<()> {
        self.run_migrations().map(|_| ()).map_err(db_err)
    }

    fn get_settings_by_prefix(&self, prefix: &str) -> CoreResult<Vec<SettingEntry>> {
        self.settings_by_prefix(prefix).map_err(db_err)
    }

    fn get_setting(&self, key: &str) -> CoreResult<Option<SettingEntry>> {
        self.setting(key).map_err(db_err)
    }

    fn put_setting(&self, key: &str, value: &str) -> CoreResult<()> {
        self.upsert_setting(key, value).map_err(db_err)
    }

    fn delete_setting(&self, key: &str) -> CoreResult<bool> {
        self.remove_setting(key).map_err(db_err)
    }

    fn upsert_transaction(&self, tx: &Transaction) -> CoreResult<()> {
        self.save_transaction(tx).map_err(db_err)
    }

    fn get_transaction_by_id(&self, id: &Uuid) -> CoreResult<Option<Transaction>> {
        self.transaction_by_id(id).map_err(db_err)
    }

    fn get_transactions(&self, filter: &TransactionFilter) -> CoreResult<Vec<Transaction>> {
        self.transactions(filter).map_err(db_err)
    }

    fn assign_categories(&self, assignments: &[CategoryAssignment]) -> CoreResult<usize> {
        self.write_categories(assignments).map_err(db_err)
    }
}
