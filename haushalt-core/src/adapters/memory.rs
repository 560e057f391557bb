//! In-memory repository
//!
//! Same observable behavior as the DuckDB adapter without touching disk.
//! Used by service tests and by callers that want to try rules against a
//! throwaway data set.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::Transaction;
use crate::ports::{CategoryAssignment, Repository, SettingEntry, TransactionFilter};

#[derive(Default)]
struct State {
    next_setting_id: i64,
    settings: BTreeMap<String, SettingEntry>,
    /// Transactions in insertion order
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl Repository for InMemoryRepository {
    fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn get_settings_by_prefix(&self, prefix: &str) -> Result<Vec<SettingEntry>> {
        let state = self.state()?;
        let mut entries: Vec<SettingEntry> = state
            .settings
            .values()
            .filter(|entry| entry.key.starts_with(prefix))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }

    fn get_setting(&self, key: &str) -> Result<Option<SettingEntry>> {
        Ok(self.state()?.settings.get(key).cloned())
    }

    fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state()?;
        if let Some(entry) = state.settings.get_mut(key) {
            entry.value = value.to_string();
            return Ok(());
        }
        state.next_setting_id += 1;
        let entry = SettingEntry {
            id: state.next_setting_id,
            key: key.to_string(),
            value: value.to_string(),
        };
        state.settings.insert(key.to_string(), entry);
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<bool> {
        Ok(self.state()?.settings.remove(key).is_some())
    }

    fn upsert_transaction(&self, tx: &Transaction) -> Result<()> {
        let mut state = self.state()?;
        match state.transactions.iter_mut().find(|t| t.id == tx.id) {
            Some(existing) => *existing = tx.clone(),
            None => state.transactions.push(tx.clone()),
        }
        Ok(())
    }

    fn get_transaction_by_id(&self, id: &Uuid) -> Result<Option<Transaction>> {
        Ok(self.state()?.transactions.iter().find(|t| t.id == *id).cloned())
    }

    fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let state = self.state()?;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| filter.account_id.as_ref().map_or(true, |a| &t.account_id == a))
            .filter(|t| !filter.uncategorized_only || !t.is_categorized())
            .cloned()
            .collect();
        // Stable: same-day transactions stay in insertion order
        transactions.sort_by_key(|t| t.transaction_date);
        Ok(transactions)
    }

    fn assign_categories(&self, assignments: &[CategoryAssignment]) -> Result<usize> {
        let mut state = self.state()?;
        let mut updated = 0;
        for assignment in assignments {
            if let Some(tx) = state
                .transactions
                .iter_mut()
                .find(|t| t.id == assignment.transaction_id)
            {
                tx.category = Some(assignment.category.clone());
                tx.category_rule_id = assignment.rule_id.clone();
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_settings_order_survives_update() {
        let repo = InMemoryRepository::new();
        repo.put_setting("p.z", "1").unwrap();
        repo.put_setting("p.a", "2").unwrap();
        repo.put_setting("other", "3").unwrap();
        repo.put_setting("p.z", "4").unwrap();

        let entries = repo.get_settings_by_prefix("p.").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "p.z");
        assert_eq!(entries[0].value, "4");
        assert_eq!(entries[1].key, "p.a");
    }

    #[test]
    fn test_assign_categories_skips_unknown_ids() {
        let repo = InMemoryRepository::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tx = Transaction::new(Uuid::new_v4(), "giro", Decimal::ONE, "x", date);
        repo.upsert_transaction(&tx).unwrap();

        let updated = repo
            .assign_categories(&[
                CategoryAssignment {
                    transaction_id: tx.id,
                    category: "food".into(),
                    rule_id: None,
                },
                CategoryAssignment {
                    transaction_id: Uuid::new_v4(),
                    category: "food".into(),
                    rule_id: None,
                },
            ])
            .unwrap();

        assert_eq!(updated, 1);
        let backlog = repo.get_transactions(&TransactionFilter::uncategorized()).unwrap();
        assert!(backlog.is_empty());
    }
}
