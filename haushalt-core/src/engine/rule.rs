//! Rule evaluation
//!
//! Runs every condition of one rule exactly once and combines the results
//! with the rule's own logic expression.

use serde::Serialize;

use super::condition::{compile_pattern, evaluate_condition};
use super::logic::{self, ConditionResults, LogicError};
use crate::domain::{Column, ConditionType, Rule, TransactionSnapshot};

/// Evaluate each condition of `rule` against `transaction`
pub fn condition_results(transaction: &TransactionSnapshot, rule: &Rule) -> ConditionResults {
    rule.conditions
        .iter()
        .map(|condition| (condition.id, evaluate_condition(transaction, condition)))
        .collect()
}

/// Evaluate a rule; only a malformed logic expression is an error
pub fn evaluate_rule(transaction: &TransactionSnapshot, rule: &Rule) -> Result<bool, LogicError> {
    let results = condition_results(transaction, rule);
    logic::evaluate(rule.condition_logic.as_deref(), &results)
}

/// Outcome of testing one rule against one synthetic transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTestResult {
    /// Overall verdict; `false` when the logic expression is malformed
    pub matched: bool,
    pub condition_results: ConditionResults,
    /// Value of the logic expression, `None` when it failed to parse
    pub logic_result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic_error: Option<String>,
    /// Conditions that can never match as written (invalid patterns, unknown names)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Evaluate a rule and report every intermediate result
pub fn diagnose_rule(transaction: &TransactionSnapshot, rule: &Rule) -> RuleTestResult {
    let results = condition_results(transaction, rule);
    let (logic_result, logic_error) =
        match logic::evaluate(rule.condition_logic.as_deref(), &results) {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };

    RuleTestResult {
        matched: logic_result.unwrap_or(false),
        condition_results: results,
        logic_result,
        logic_error,
        warnings: condition_warnings(rule),
    }
}

fn condition_warnings(rule: &Rule) -> Vec<String> {
    let mut warnings = Vec::new();
    for condition in &rule.conditions {
        if let ConditionType::Unknown(name) = &condition.condition_type {
            warnings.push(format!("condition {}: unknown type '{}'", condition.id, name));
        }
        if let Column::Unknown(name) = &condition.column_name {
            warnings.push(format!("condition {}: unknown column '{}'", condition.id, name));
        }
        let amount_range = condition.condition_type == ConditionType::AmountRange;
        if amount_range && condition.amount_bounds().is_none() {
            warnings.push(format!("condition {}: amount bound is not a number", condition.id));
        }
        if condition.condition_type == ConditionType::Regex {
            if let Some(pattern) = condition.value.as_deref() {
                if let Err(e) = compile_pattern(pattern, condition.case_sensitive) {
                    warnings.push(format!("condition {}: invalid pattern: {}", condition.id, e));
                }
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AmountBound, Condition};
    use rust_decimal::Decimal;

    fn rent_rule() -> Rule {
        Rule::new(
            "rent",
            "Miete",
            "housing",
            vec![
                Condition::contains(1, Column::Description, "miete"),
                Condition::contains(2, Column::RecipientApplicant, "hausverwaltung"),
                Condition::amount_range(
                    3,
                    Some(Decimal::new(-1000, 0)),
                    Some(Decimal::new(-800, 0)),
                ),
            ],
        )
        .with_logic("(1 OR 2) AND 3")
    }

    #[test]
    fn test_every_condition_is_evaluated() {
        let tx = TransactionSnapshot::new("Dauerauftrag", Decimal::new(-950, 0))
            .with_recipient("Hausverwaltung Schmidt");

        let results = condition_results(&tx, &rent_rule());
        assert_eq!(results.len(), 3);
        assert_eq!(results[&1], false);
        assert_eq!(results[&2], true);
        assert_eq!(results[&3], true);
        assert_eq!(evaluate_rule(&tx, &rent_rule()), Ok(true));
    }

    #[test]
    fn test_amount_outside_range_fails_rule() {
        let tx = TransactionSnapshot::new("Miete Juni", Decimal::new(-1200, 0));
        assert_eq!(evaluate_rule(&tx, &rent_rule()), Ok(false));
    }

    #[test]
    fn test_default_logic_is_any_condition() {
        let mut rule = rent_rule();
        rule.condition_logic = None;

        let tx = TransactionSnapshot::new("Miete Juni", Decimal::new(-1200, 0));
        assert_eq!(evaluate_rule(&tx, &rule), Ok(true));
    }

    #[test]
    fn test_malformed_logic_is_an_error() {
        let rule = rent_rule().with_logic("(1 OR 2 AND 3");
        let tx = TransactionSnapshot::new("Miete", Decimal::new(-900, 0));
        assert!(evaluate_rule(&tx, &rule).is_err());
    }

    #[test]
    fn test_diagnose_reports_all_parts() {
        let tx = TransactionSnapshot::new("Miete Juni", Decimal::new(-900, 0));
        let result = diagnose_rule(&tx, &rent_rule());

        assert!(result.matched);
        assert_eq!(result.logic_result, Some(true));
        assert!(result.logic_error.is_none());
        assert_eq!(
            result.condition_results,
            [(1, true), (2, false), (3, true)].into_iter().collect()
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_diagnose_surfaces_parse_error() {
        let rule = rent_rule().with_logic("1 AND AND 3");
        let tx = TransactionSnapshot::new("Miete Juni", Decimal::new(-900, 0));
        let result = diagnose_rule(&tx, &rule);

        assert!(!result.matched);
        assert_eq!(result.logic_result, None);
        assert_eq!(
            result.logic_error.as_deref(),
            Some("expected a condition id or '(' at position 6")
        );
        assert_eq!(result.condition_results.len(), 3);
    }

    #[test]
    fn test_diagnose_warns_about_dead_conditions() {
        let rule = Rule::new(
            "r",
            "broken",
            "misc",
            vec![
                Condition::text(1, ConditionType::Regex, Column::Description, "[a-"),
                Condition::contains(2, Column::Unknown("memo".into()), "x"),
                Condition {
                    min_amount: Some(AmountBound::Malformed("abc".into())),
                    ..Condition::amount_range(3, None, None)
                },
            ],
        );
        let result = diagnose_rule(&TransactionSnapshot::new("x", Decimal::ZERO), &rule);

        assert!(!result.matched);
        assert_eq!(result.warnings.len(), 3);
        assert!(result.warnings[0].starts_with("condition 1: invalid pattern"));
        assert_eq!(result.warnings[1], "condition 2: unknown column 'memo'");
        assert_eq!(result.warnings[2], "condition 3: amount bound is not a number");
    }

    #[test]
    fn test_serializes_camel_case() {
        let tx = TransactionSnapshot::new("Miete", Decimal::new(-900, 0));
        let json = serde_json::to_value(diagnose_rule(&tx, &rent_rule())).unwrap();

        assert_eq!(json["matched"], true);
        assert_eq!(json["logicResult"], true);
        assert_eq!(json["conditionResults"]["3"], true);
        assert!(json.get("logicError").is_none());
    }
}
