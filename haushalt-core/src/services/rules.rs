//! Rule service - category rule storage
//!
//! Rules are JSON documents in the settings store under
//! `category_rule.<rule id>`. Reading them back in storage order gives the
//! tie-break order the selector relies on for equal priorities.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Error;
use crate::domain::{Rule, RuleValidationError, TransactionSnapshot};
use crate::engine::{self, logic, RuleTestResult, SkippedRule};
use crate::ports::{Repository, SettingEntry};

/// Settings key prefix for category rules
pub const RULE_KEY_PREFIX: &str = "category_rule.";

/// A stored entry that could not be turned into a valid rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidRuleEntry {
    pub key: String,
    pub error: String,
}

impl InvalidRuleEntry {
    /// Entry for a rule skipped during selection
    pub fn skipped(skipped: &SkippedRule) -> Self {
        Self {
            key: RuleService::rule_key(&skipped.rule_id),
            error: skipped.error.to_string(),
        }
    }

    /// Rule id part of the settings key
    pub fn rule_id(&self) -> &str {
        self.key.strip_prefix(RULE_KEY_PREFIX).unwrap_or(&self.key)
    }
}

/// Stored rules in storage order, plus the entries that failed to decode
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleListing {
    pub rules: Vec<Rule>,
    pub invalid: Vec<InvalidRuleEntry>,
}

pub struct RuleService {
    repository: Arc<dyn Repository>,
}

impl RuleService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn rule_key(id: &str) -> String {
        format!("{}{}", RULE_KEY_PREFIX, id)
    }

    /// Every stored rule; undecodable entries are reported, not dropped
    pub fn list_rules(&self) -> Result<RuleListing> {
        let entries = self
            .repository
            .get_settings_by_prefix(RULE_KEY_PREFIX)
            .context("Failed to read stored rules")?;

        let mut listing = RuleListing::default();
        for entry in entries {
            match decode_entry(&entry) {
                Ok(rule) => listing.rules.push(rule),
                Err(e) => listing.invalid.push(InvalidRuleEntry {
                    key: entry.key,
                    error: e.to_string(),
                }),
            }
        }
        Ok(listing)
    }

    /// Enabled rules only, in storage order
    pub fn get_enabled_rules(&self) -> Result<RuleListing> {
        let mut listing = self.list_rules()?;
        listing.rules.retain(|rule| rule.enabled);
        Ok(listing)
    }

    /// A stored rule as written, without validation, so broken rules can be tested
    pub fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        let key = Self::rule_key(id);
        match self.repository.get_setting(&key)? {
            Some(entry) => {
                let rule = read_entry(&entry)
                    .with_context(|| format!("Stored rule '{}' is not valid JSON", id))?;
                Ok(Some(rule))
            }
            None => Ok(None),
        }
    }

    /// Validate and store a rule, assigning a fresh id when it has none
    pub fn save_rule(&self, mut rule: Rule) -> Result<Rule> {
        if rule.id.trim().is_empty() {
            rule.id = Uuid::new_v4().to_string();
        }
        rule.validate().map_err(Error::from)?;
        self.store(&rule)?;
        Ok(rule)
    }

    fn store(&self, rule: &Rule) -> Result<()> {
        let json = serde_json::to_string(rule)?;
        self.repository.put_setting(&Self::rule_key(&rule.id), &json)?;
        Ok(())
    }

    /// Decode a rule document and store it
    pub fn save_rule_json(&self, json: &str) -> Result<Rule> {
        let rule = Rule::from_json(json).map_err(Error::from)?;
        self.save_rule(rule)
    }

    pub fn delete_rule(&self, id: &str) -> Result<bool> {
        Ok(self.repository.delete_setting(&Self::rule_key(id))?)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<Rule> {
        let mut rule = self
            .get_rule(id)?
            .ok_or_else(|| Error::not_found(format!("rule '{}'", id)))?;
        rule.enabled = enabled;
        // Toggling must work for rules that no longer pass the authoring checks
        self.store(&rule)?;
        Ok(rule)
    }

    /// Evaluate a rule against a synthetic transaction without storing anything
    pub fn test_rule(&self, rule: &Rule, transaction: &TransactionSnapshot) -> RuleTestResult {
        engine::diagnose_rule(transaction, rule)
    }

    /// Check an expression for editors: syntax plus references to `condition_ids`
    pub fn check_logic(expression: &str, condition_ids: &[u32]) -> std::result::Result<(), String> {
        let referenced = logic::referenced_ids(expression).map_err(|e| e.to_string())?;
        match referenced.iter().find(|id| !condition_ids.contains(*id)) {
            Some(id) => Err(RuleValidationError::UnknownLogicReference(*id).to_string()),
            None => Ok(()),
        }
    }
}

/// Decode one stored entry; a document without an id takes it from the key
fn read_entry(entry: &SettingEntry) -> std::result::Result<Rule, RuleValidationError> {
    let mut rule = Rule::from_json(&entry.value)?;
    if rule.id.trim().is_empty() {
        if let Some(id) = entry.key.strip_prefix(RULE_KEY_PREFIX) {
            rule.id = id.to_string();
        }
    }
    Ok(rule)
}

/// Decode one stored entry for evaluation
fn decode_entry(entry: &SettingEntry) -> std::result::Result<Rule, RuleValidationError> {
    let rule = read_entry(entry)?;
    rule.validate_stored()?;
    Ok(rule)
}
