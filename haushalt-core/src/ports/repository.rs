//! Repository port - persistence abstraction

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::Transaction;

/// A key-value settings entry
///
/// `id` is assigned on first insert and never changes on update, so reading
/// entries ordered by id returns them in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingEntry {
    pub id: i64,
    pub key: String,
    pub value: String,
}

/// Which transactions to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Restrict to one account
    pub account_id: Option<String>,
    /// Only transactions without a category
    pub uncategorized_only: bool,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn uncategorized() -> Self {
        Self {
            account_id: None,
            uncategorized_only: true,
        }
    }

    pub fn for_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// A category to write onto a stored transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAssignment {
    pub transaction_id: Uuid,
    pub category: String,
    /// Rule that produced the assignment
    pub rule_id: Option<String>,
}

/// Database repository abstraction
///
/// Implementations must be safe to share between threads; services hold
/// them behind an `Arc<dyn Repository>`.
pub trait Repository: Send + Sync {
    // === Schema ===

    /// Run any pending migrations
    fn ensure_schema(&self) -> Result<()>;

    // === Settings ===

    /// Entries whose key starts with `prefix`, ordered by id
    fn get_settings_by_prefix(&self, prefix: &str) -> Result<Vec<SettingEntry>>;

    fn get_setting(&self, key: &str) -> Result<Option<SettingEntry>>;

    /// Insert or replace the value under `key`, keeping its id on update
    fn put_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Returns whether an entry was removed
    fn delete_setting(&self, key: &str) -> Result<bool>;

    // === Transactions ===

    fn upsert_transaction(&self, tx: &Transaction) -> Result<()>;

    fn get_transaction_by_id(&self, id: &Uuid) -> Result<Option<Transaction>>;

    /// Transactions matching `filter`, oldest first
    fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;

    /// Write all assignments atomically; returns the number of updated rows
    fn assign_categories(&self, assignments: &[CategoryAssignment]) -> Result<usize>;
}
