//! Rule selection
//!
//! First-match policy: rules that apply to the account are tried in
//! descending priority and the first one that matches decides the category.
//! Rules with equal priority keep the order they were supplied in, so the
//! caller controls the tie-break (storage order in practice).

use serde::Serialize;

use super::logic::LogicError;
use super::rule::evaluate_rule;
use crate::domain::{Rule, TransactionSnapshot};

/// The rule that decided a transaction's category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    pub rule_id: String,
    pub rule_name: String,
    pub category: String,
    pub priority: i32,
}

impl RuleMatch {
    fn from_rule(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            category: rule.category.clone(),
            priority: rule.priority,
        }
    }
}

/// A candidate rule that was skipped because its logic expression is malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub rule_id: String,
    pub rule_name: String,
    pub error: LogicError,
}

/// Selection result with diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub matched: Option<RuleMatch>,
    /// Rules evaluated before the match (or all, without a match) that failed to parse
    pub rule_errors: Vec<SkippedRule>,
}

/// Rules applicable to `account_id`, highest priority first (stable)
pub fn candidates_for_account<'r>(account_id: &str, rules: &'r [Rule]) -> Vec<&'r Rule> {
    let mut candidates: Vec<&Rule> = rules
        .iter()
        .filter(|rule| rule.applies_to_account(account_id))
        .collect();
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates
}

/// Select the first matching rule, reporting rules skipped on the way
pub fn select_detailed(
    transaction: &TransactionSnapshot,
    account_id: &str,
    rules: &[Rule],
) -> SelectionOutcome {
    let mut outcome = SelectionOutcome::default();

    for rule in candidates_for_account(account_id, rules) {
        match evaluate_rule(transaction, rule) {
            Ok(true) => {
                outcome.matched = Some(RuleMatch::from_rule(rule));
                break;
            }
            Ok(false) => {}
            Err(error) => outcome.rule_errors.push(SkippedRule {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                error,
            }),
        }
    }

    outcome
}

/// Category of the first matching rule, or `None` when nothing matches
pub fn select(
    transaction: &TransactionSnapshot,
    account_id: &str,
    rules: &[Rule],
) -> Option<String> {
    select_detailed(transaction, account_id, rules)
        .matched
        .map(|m| m.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, Condition};
    use rust_decimal::Decimal;

    fn always(id: &str, category: &str, priority: i32) -> Rule {
        Rule::new(id, id, category, vec![Condition::contains(1, Column::Description, "a")])
            .with_priority(priority)
    }

    fn never(id: &str, category: &str, priority: i32) -> Rule {
        Rule::new(id, id, category, vec![Condition::contains(1, Column::Description, "zzz")])
            .with_priority(priority)
    }

    fn tx() -> TransactionSnapshot {
        TransactionSnapshot::new("a transaction", Decimal::new(-100, 0))
    }

    #[test]
    fn test_higher_priority_wins() {
        let rules = vec![
            always("b", "cat-b", 5).with_accounts(["giro"]),
            always("a", "cat-a", 10).with_accounts(["giro"]),
        ];
        assert_eq!(select(&tx(), "giro", &rules), Some("cat-a".to_string()));
    }

    #[test]
    fn test_equal_priority_keeps_input_order() {
        let rules = vec![always("first", "cat-1", 5), always("second", "cat-2", 5)];
        assert_eq!(select(&tx(), "giro", &rules), Some("cat-1".to_string()));

        let reversed = vec![always("second", "cat-2", 5), always("first", "cat-1", 5)];
        assert_eq!(select(&tx(), "giro", &reversed), Some("cat-2".to_string()));
    }

    #[test]
    fn test_account_filter() {
        let rules = vec![
            always("savings-only", "cat-savings", 10).with_accounts(["savings"]),
            always("global", "cat-global", 1),
        ];
        assert_eq!(select(&tx(), "giro", &rules), Some("cat-global".to_string()));
        assert_eq!(select(&tx(), "savings", &rules), Some("cat-savings".to_string()));

        let restricted = vec![always("savings-only", "cat-savings", 10).with_accounts(["savings"])];
        assert_eq!(select(&tx(), "giro", &restricted), None);
    }

    #[test]
    fn test_falls_through_to_lower_priority_match() {
        let rules = vec![never("high", "cat-high", 9), always("low", "cat-low", 1)];
        let outcome = select_detailed(&tx(), "giro", &rules);

        let matched = outcome.matched.unwrap();
        assert_eq!(matched.rule_id, "low");
        assert_eq!(matched.category, "cat-low");
        assert_eq!(matched.priority, 1);
        assert!(outcome.rule_errors.is_empty());
    }

    #[test]
    fn test_no_match_is_none() {
        let rules = vec![never("a", "cat-a", 5), never("b", "cat-b", 7)];
        assert_eq!(select(&tx(), "giro", &rules), None);
        assert_eq!(select(&tx(), "giro", &[]), None);
    }

    #[test]
    fn test_malformed_rule_is_skipped_and_reported() {
        let rules = vec![
            always("broken", "cat-broken", 10).with_logic("1 OR ("),
            always("fine", "cat-fine", 5),
        ];
        let outcome = select_detailed(&tx(), "giro", &rules);

        assert_eq!(outcome.matched.map(|m| m.category), Some("cat-fine".to_string()));
        assert_eq!(outcome.rule_errors.len(), 1);
        assert_eq!(outcome.rule_errors[0].rule_id, "broken");
        assert_eq!(outcome.rule_errors[0].error, LogicError::UnexpectedEnd);
    }

    #[test]
    fn test_candidates_sorted_descending() {
        let rules = vec![
            always("a", "x", 1),
            always("b", "x", 10),
            always("c", "x", 5),
            always("d", "x", 10),
        ];
        let order: Vec<&str> = candidates_for_account("giro", &rules)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "d", "c", "a"]);
    }
}
