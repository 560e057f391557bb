//! Category rule domain entity
//!
//! Rules are stored as one JSON document per settings entry. Validation has
//! two levels: `validate` is the strict check applied when a rule is saved,
//! `validate_stored` is the check a stored rule must pass to be evaluated at
//! all. A malformed condition in a stored rule only disables that condition.

use std::collections::{BTreeSet, HashSet};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::condition::{Column, Condition, ConditionType};
use crate::engine::logic::{self, LogicError};

/// Priority assigned when a rule does not specify one
pub const DEFAULT_PRIORITY: i32 = 5;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

/// A user-authored rule mapping matching transactions to a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Opaque identifier, stable across edits
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub conditions: Vec<Condition>,
    /// Boolean expression over condition ids; `None`/empty means "any condition"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_logic: Option<String>,
    /// Target category
    #[serde(deserialize_with = "id_string")]
    pub category: String,
    /// Accounts the rule applies to; empty means every account
    #[serde(default, deserialize_with = "id_set")]
    pub accounts: BTreeSet<String>,
    /// Higher priorities are evaluated first
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Reasons a rule is rejected at the decoding boundary
#[derive(Debug, Error)]
pub enum RuleValidationError {
    #[error("invalid rule JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule id is empty")]
    MissingId,

    #[error("rule '{0}' has no category")]
    MissingCategory(String),

    #[error("rule '{0}' has no conditions")]
    NoConditions(String),

    #[error("condition ids must be positive integers")]
    ZeroConditionId,

    #[error("condition id {0} is used more than once")]
    DuplicateConditionId(u32),

    #[error("condition {id} has unknown type '{name}'")]
    UnknownConditionType { id: u32, name: String },

    #[error("condition {id} has unknown column '{name}'")]
    UnknownColumn { id: u32, name: String },

    #[error("condition {id} needs a non-empty value")]
    MissingValue { id: u32 },

    #[error("condition {id} uses amountRange on column '{column}'; only 'amount' is supported")]
    AmountRangeColumn { id: u32, column: String },

    #[error("condition {id} compares text on the amount column; use amountRange")]
    TextOnAmount { id: u32 },

    #[error("condition {id} has an amount bound that is not a decimal number")]
    MalformedAmount { id: u32 },

    #[error("condition {id} has minAmount greater than maxAmount")]
    InvertedAmountRange { id: u32 },

    #[error("invalid condition logic: {0}")]
    Logic(#[from] LogicError),

    #[error("condition logic references unknown condition id {0}")]
    UnknownLogicReference(u32),
}

impl Rule {
    /// Create an enabled rule with default priority and no account restriction
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            conditions,
            condition_logic: None,
            category: category.into(),
            accounts: BTreeSet::new(),
            priority: DEFAULT_PRIORITY,
            enabled: true,
        }
    }

    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.condition_logic = Some(logic.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts = accounts.into_iter().map(Into::into).collect();
        self
    }

    /// Decode a rule document without validating it
    pub fn from_json(json: &str) -> Result<Self, RuleValidationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when the rule applies to transactions of `account_id`
    pub fn applies_to_account(&self, account_id: &str) -> bool {
        self.accounts.is_empty() || self.accounts.contains(account_id)
    }

    /// Condition ids in declaration order
    pub fn condition_ids(&self) -> Vec<u32> {
        self.conditions.iter().map(|c| c.id).collect()
    }

    /// Rule-level checks for a stored rule: identity, target and logic syntax
    pub fn validate_stored(&self) -> Result<(), RuleValidationError> {
        if self.id.trim().is_empty() {
            return Err(RuleValidationError::MissingId);
        }
        if self.category.trim().is_empty() {
            return Err(RuleValidationError::MissingCategory(self.id.clone()));
        }
        if let Some(expression) = self.condition_logic.as_deref() {
            logic::referenced_ids(expression)?;
        }
        Ok(())
    }

    /// Full authoring check, applied before a rule is written
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        self.validate_stored()?;
        if self.conditions.is_empty() {
            return Err(RuleValidationError::NoConditions(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for condition in &self.conditions {
            if condition.id == 0 {
                return Err(RuleValidationError::ZeroConditionId);
            }
            if !seen.insert(condition.id) {
                return Err(RuleValidationError::DuplicateConditionId(condition.id));
            }
            validate_condition(condition)?;
        }

        if let Some(expression) = self.condition_logic.as_deref() {
            for id in logic::referenced_ids(expression)? {
                if !seen.contains(&id) {
                    return Err(RuleValidationError::UnknownLogicReference(id));
                }
            }
        }

        Ok(())
    }
}

fn validate_condition(condition: &Condition) -> Result<(), RuleValidationError> {
    let id = condition.id;

    if let ConditionType::Unknown(name) = &condition.condition_type {
        return Err(RuleValidationError::UnknownConditionType { id, name: name.clone() });
    }
    if let Column::Unknown(name) = &condition.column_name {
        return Err(RuleValidationError::UnknownColumn { id, name: name.clone() });
    }

    match (&condition.condition_type, &condition.column_name) {
        (ConditionType::AmountRange, Column::Amount) => match condition.amount_bounds() {
            None => return Err(RuleValidationError::MalformedAmount { id }),
            Some((Some(min), Some(max))) if min > max => {
                return Err(RuleValidationError::InvertedAmountRange { id });
            }
            Some(_) => {}
        },
        (ConditionType::AmountRange, column) => {
            return Err(RuleValidationError::AmountRangeColumn {
                id,
                column: column.to_string(),
            });
        }
        (_, Column::Amount) => return Err(RuleValidationError::TextOnAmount { id }),
        _ => {
            if condition.value.as_deref().map_or(true, str::is_empty) {
                return Err(RuleValidationError::MissingValue { id });
            }
        }
    }

    Ok(())
}

// Ids arrive as strings or numbers depending on which client wrote the rule.

fn json_id<E: de::Error>(value: JsonValue) -> Result<String, E> {
    match value {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(E::custom(format!("expected a string or number id, got {}", other))),
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None => Ok(String::new()),
        Some(value) => json_id(value),
    }
}

fn id_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<JsonValue>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(json_id::<D::Error>)
        .collect()
}
