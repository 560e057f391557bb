//! Condition domain model
//!
//! A condition is one atomic test against a single transaction field. Type
//! and column names arrive as free-form strings from stored rule JSON, so
//! unrecognized names are kept as `Unknown` instead of failing the whole rule.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Comparison semantics of a condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Regex,
    AmountRange,
    /// Unrecognized type name; never matches
    Unknown(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionType::Contains => "contains",
            ConditionType::Equals => "equals",
            ConditionType::StartsWith => "startsWith",
            ConditionType::EndsWith => "endsWith",
            ConditionType::Regex => "regex",
            ConditionType::AmountRange => "amountRange",
            ConditionType::Unknown(name) => name,
        }
    }

    /// True for the types that compare against `value`
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            ConditionType::Contains
                | ConditionType::Equals
                | ConditionType::StartsWith
                | ConditionType::EndsWith
                | ConditionType::Regex
        )
    }
}

impl From<String> for ConditionType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "contains" => ConditionType::Contains,
            "equals" => ConditionType::Equals,
            "startsWith" => ConditionType::StartsWith,
            "endsWith" => ConditionType::EndsWith,
            "regex" => ConditionType::Regex,
            "amountRange" => ConditionType::AmountRange,
            _ => ConditionType::Unknown(name),
        }
    }
}

impl From<ConditionType> for String {
    fn from(kind: ConditionType) -> Self {
        match kind {
            ConditionType::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction field a condition reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Column {
    Description,
    RecipientApplicant,
    Amount,
    Iban,
    /// Unrecognized column name; never matches
    Unknown(String),
}

impl Column {
    pub fn as_str(&self) -> &str {
        match self {
            Column::Description => "description",
            Column::RecipientApplicant => "recipientApplicant",
            Column::Amount => "amount",
            Column::Iban => "iban",
            Column::Unknown(name) => name,
        }
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        match name.as_str() {
            "description" => Column::Description,
            "recipientApplicant" => Column::RecipientApplicant,
            "amount" => Column::Amount,
            "iban" => Column::Iban,
            _ => Column::Unknown(name),
        }
    }
}

impl From<Column> for String {
    fn from(column: Column) -> Self {
        match column {
            Column::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `amountRange` bound as stored
///
/// Bounds arrive as JSON numbers or numeric strings. Anything else is kept
/// as written so the condition can report it and never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountBound {
    Value(Decimal),
    Malformed(JsonValue),
}

impl AmountBound {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            AmountBound::Value(value) => Some(*value),
            AmountBound::Malformed(_) => None,
        }
    }
}

impl From<Decimal> for AmountBound {
    fn from(value: Decimal) -> Self {
        AmountBound::Value(value)
    }
}

/// One typed test against a transaction field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Unique within the owning rule, referenced by the logic expression
    pub id: u32,
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub column_name: Column,
    /// Operand for the text types, absent for `amountRange`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Inclusive lower bound for `amountRange`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<AmountBound>,
    /// Inclusive upper bound for `amountRange`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<AmountBound>,
}

impl Condition {
    /// Create a text condition (case-insensitive)
    pub fn text(
        id: u32,
        condition_type: ConditionType,
        column_name: Column,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id,
            condition_type,
            column_name,
            value: Some(value.into()),
            case_sensitive: false,
            min_amount: None,
            max_amount: None,
        }
    }

    /// Create a `contains` condition on the given column
    pub fn contains(id: u32, column_name: Column, value: impl Into<String>) -> Self {
        Self::text(id, ConditionType::Contains, column_name, value)
    }

    /// Create an `amountRange` condition; `None` leaves that side unbounded
    pub fn amount_range(id: u32, min_amount: Option<Decimal>, max_amount: Option<Decimal>) -> Self {
        Self {
            id,
            condition_type: ConditionType::AmountRange,
            column_name: Column::Amount,
            value: None,
            case_sensitive: false,
            min_amount: min_amount.map(AmountBound::Value),
            max_amount: max_amount.map(AmountBound::Value),
        }
    }

    /// Parsed `(min, max)` bounds, `None` when either bound is malformed
    pub fn amount_bounds(&self) -> Option<(Option<Decimal>, Option<Decimal>)> {
        let parse = |bound: &Option<AmountBound>| match bound {
            None => Some(None),
            Some(bound) => bound.value().map(Some),
        };
        Some((parse(&self.min_amount)?, parse(&self.max_amount)?))
    }

    /// Make the comparison case-sensitive
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_text_condition() {
        let condition: Condition = serde_json::from_str(
            r#"{"id": 1, "type": "contains", "columnName": "description", "value": "MIETE"}"#,
        )
        .unwrap();

        assert_eq!(condition.condition_type, ConditionType::Contains);
        assert_eq!(condition.column_name, Column::Description);
        assert_eq!(condition.value.as_deref(), Some("MIETE"));
        assert!(!condition.case_sensitive);
    }

    #[test]
    fn test_deserialize_amount_bounds_from_numbers_and_strings() {
        let condition: Condition = serde_json::from_str(
            r#"{"id": 2, "type": "amountRange", "columnName": "amount",
                "minAmount": -1000, "maxAmount": "-800.50"}"#,
        )
        .unwrap();

        assert_eq!(
            condition.amount_bounds(),
            Some((Some(Decimal::new(-1000, 0)), Some(Decimal::new(-80050, 2))))
        );
    }

    #[test]
    fn test_malformed_amount_bound_is_kept() {
        let condition: Condition = serde_json::from_str(
            r#"{"id": 2, "type": "amountRange", "columnName": "amount",
                "minAmount": "abc", "maxAmount": 5}"#,
        )
        .unwrap();

        assert_eq!(condition.min_amount, Some(AmountBound::Malformed("abc".into())));
        assert_eq!(condition.max_amount, Some(AmountBound::Value(Decimal::new(5, 0))));
        assert_eq!(condition.amount_bounds(), None);

        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["minAmount"], "abc");
    }

    #[test]
    fn test_unknown_names_are_preserved() {
        let condition: Condition = serde_json::from_str(
            r#"{"id": 3, "type": "fuzzy", "columnName": "memo", "value": "x"}"#,
        )
        .unwrap();

        assert_eq!(condition.condition_type, ConditionType::Unknown("fuzzy".into()));
        assert_eq!(condition.column_name, Column::Unknown("memo".into()));

        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "fuzzy");
        assert_eq!(json["columnName"], "memo");
    }
}
