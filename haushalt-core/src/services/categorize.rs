//! Categorize service - applies category rules to stored transactions

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use uuid::Uuid;

use super::rules::{InvalidRuleEntry, RuleListing, RuleService};
use crate::domain::{Rule, Transaction};
use crate::engine::{self, RuleMatch, SelectionOutcome, SkippedRule};
use crate::ports::{CategoryAssignment, Repository, TransactionFilter};

/// Behavior switches for a categorization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorizeOptions {
    /// Re-score transactions that already have a category
    pub recategorize: bool,
    /// Skip stored rules that fail to decode instead of failing the run
    pub skip_invalid_rules: bool,
}

impl Default for CategorizeOptions {
    fn default() -> Self {
        Self {
            recategorize: false,
            skip_invalid_rules: true,
        }
    }
}

/// One category change made (or proposed, in a dry run)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub transaction_id: Uuid,
    pub account_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub category: String,
    pub previous_category: Option<String>,
}

/// Result of a categorization run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorizeResult {
    pub dry_run: bool,
    pub rules_loaded: usize,
    pub transactions_evaluated: usize,
    pub transactions_categorized: usize,
    pub still_uncategorized: usize,
    pub assignments: Vec<Assignment>,
    /// Rules that were skipped, either undecodable or with a broken logic expression
    pub invalid_rules: Vec<InvalidRuleEntry>,
}

pub struct CategorizeService {
    repository: Arc<dyn Repository>,
    rules: RuleService,
    options: CategorizeOptions,
}

impl CategorizeService {
    pub fn new(repository: Arc<dyn Repository>, options: CategorizeOptions) -> Self {
        Self {
            rules: RuleService::new(Arc::clone(&repository)),
            repository,
            options,
        }
    }

    /// Rule that would categorize `transaction`, using its own account
    pub fn categorize(transaction: &Transaction, rules: &[Rule]) -> Option<RuleMatch> {
        Self::categorize_detailed(transaction, rules).matched
    }

    /// Like `categorize`, also returning the rules skipped for broken logic
    pub fn categorize_detailed(transaction: &Transaction, rules: &[Rule]) -> SelectionOutcome {
        engine::select_detailed(&transaction.snapshot(), &transaction.account_id, rules)
    }

    /// Run the enabled rules over the backlog
    ///
    /// All assignments are written in one repository call at the end, so an
    /// error leaves every transaction untouched. `dry_run` computes the same
    /// result without writing.
    pub fn apply_rules(&self, account_id: Option<&str>, dry_run: bool) -> Result<CategorizeResult> {
        let listing = self.rules.get_enabled_rules()?;
        check_invalid_rules(&listing, self.options.skip_invalid_rules)?;

        let filter = TransactionFilter {
            account_id: account_id.map(str::to_string),
            uncategorized_only: !self.options.recategorize,
        };
        let transactions = self
            .repository
            .get_transactions(&filter)
            .context("Failed to load transactions")?;

        let mut result = CategorizeResult {
            dry_run,
            rules_loaded: listing.rules.len(),
            transactions_evaluated: transactions.len(),
            invalid_rules: listing.invalid,
            ..Default::default()
        };

        for tx in &transactions {
            let outcome = Self::categorize_detailed(tx, &listing.rules);
            merge_skipped(&mut result.invalid_rules, &outcome.rule_errors);

            match outcome.matched {
                Some(matched) => {
                    let unchanged = tx.category.as_deref() == Some(matched.category.as_str())
                        && tx.category_rule_id.as_deref() == Some(matched.rule_id.as_str());
                    if !unchanged {
                        result.assignments.push(Assignment {
                            transaction_id: tx.id,
                            account_id: tx.account_id.clone(),
                            rule_id: matched.rule_id,
                            rule_name: matched.rule_name,
                            category: matched.category,
                            previous_category: tx.category.clone(),
                        });
                    }
                }
                None if !tx.is_categorized() => result.still_uncategorized += 1,
                None => {}
            }
        }

        result.transactions_categorized = result.assignments.len();

        if !dry_run && !result.assignments.is_empty() {
            let writes: Vec<CategoryAssignment> = result
                .assignments
                .iter()
                .map(|a| CategoryAssignment {
                    transaction_id: a.transaction_id,
                    category: a.category.clone(),
                    rule_id: Some(a.rule_id.clone()),
                })
                .collect();
            self.repository
                .assign_categories(&writes)
                .context("Failed to save category assignments")?;
        }

        Ok(result)
    }
}

/// Fail on undecodable stored rules unless they may be skipped
pub(crate) fn check_invalid_rules(listing: &RuleListing, skip_invalid_rules: bool) -> Result<()> {
    match listing.invalid.first() {
        Some(first) if !skip_invalid_rules => {
            bail!("Stored rule {} is invalid: {}", first.key, first.error)
        }
        _ => Ok(()),
    }
}

/// Add selection-time rule errors, once per rule
pub(crate) fn merge_skipped(invalid: &mut Vec<InvalidRuleEntry>, skipped: &[SkippedRule]) {
    for rule in skipped {
        let entry = InvalidRuleEntry::skipped(rule);
        if !invalid.iter().any(|existing| existing.key == entry.key) {
            invalid.push(entry);
        }
    }
}
