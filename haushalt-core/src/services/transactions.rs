//! Transaction service - manual entry and listing

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use super::categorize::{check_invalid_rules, merge_skipped, CategorizeService};
use super::rules::{InvalidRuleEntry, RuleService};
use crate::domain::result::Error;
use crate::domain::{Transaction, AMOUNT_SCALE};
use crate::engine::RuleMatch;
use crate::ports::{Repository, TransactionFilter};

/// A newly stored transaction and the rule that categorized it, if any
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    pub matched_rule: Option<RuleMatch>,
    /// Rules left out of auto-categorization, undecodable or with broken logic
    pub skipped_rules: Vec<InvalidRuleEntry>,
}

pub struct TransactionService {
    repository: Arc<dyn Repository>,
    rules: RuleService,
    auto_categorize: bool,
    skip_invalid_rules: bool,
}

impl TransactionService {
    pub fn new(
        repository: Arc<dyn Repository>,
        auto_categorize: bool,
        skip_invalid_rules: bool,
    ) -> Self {
        Self {
            rules: RuleService::new(Arc::clone(&repository)),
            repository,
            auto_categorize,
            skip_invalid_rules,
        }
    }

    /// Store a new transaction, categorizing it first when enabled
    ///
    /// A transaction that already carries a category is stored as is.
    /// Amounts with more than [`AMOUNT_SCALE`] decimal places are rejected
    /// because storage would round them after the rules have seen them.
    pub fn create(&self, mut transaction: Transaction) -> Result<CreatedTransaction> {
        if !transaction.has_storable_amount() {
            return Err(Error::validation(format!(
                "amount {} has more than {} decimal places",
                transaction.amount, AMOUNT_SCALE
            ))
            .into());
        }

        let mut matched_rule = None;
        let mut skipped_rules = Vec::new();
        if self.auto_categorize && !transaction.is_categorized() {
            let listing = self.rules.get_enabled_rules()?;
            check_invalid_rules(&listing, self.skip_invalid_rules)?;
            skipped_rules = listing.invalid;

            let outcome = CategorizeService::categorize_detailed(&transaction, &listing.rules);
            merge_skipped(&mut skipped_rules, &outcome.rule_errors);
            if let Some(matched) = outcome.matched {
                transaction.category = Some(matched.category.clone());
                transaction.category_rule_id = Some(matched.rule_id.clone());
                matched_rule = Some(matched);
            }
        }

        self.repository
            .upsert_transaction(&transaction)
            .context("Failed to save transaction")?;

        Ok(CreatedTransaction {
            transaction,
            matched_rule,
            skipped_rules,
        })
    }

    pub fn get(&self, id: &Uuid) -> Result<Option<Transaction>> {
        Ok(self.repository.get_transaction_by_id(id)?)
    }

    pub fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        Ok(self.repository.get_transactions(filter)?)
    }
}
