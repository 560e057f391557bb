//! Condition evaluation
//!
//! Every failure mode (absent field, invalid pattern, unparseable bound,
//! type/column mismatch)
//! collapses to "does not match" so one broken condition never aborts the
//! rest of a rule.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use crate::domain::{Column, Condition, ConditionType, TransactionSnapshot};

/// Evaluate one condition against one transaction
pub fn evaluate_condition(transaction: &TransactionSnapshot, condition: &Condition) -> bool {
    match &condition.column_name {
        Column::Amount => amount_matches(transaction.amount, condition),
        column => match transaction.text(column) {
            Some(text) => text_matches(text, condition),
            None => false,
        },
    }
}

/// Compile a `regex` condition pattern
///
/// Case-insensitive conditions use the regex flag instead of lowercasing so
/// that character classes keep their meaning.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
}

fn amount_matches(amount: Decimal, condition: &Condition) -> bool {
    if condition.condition_type != ConditionType::AmountRange {
        return false;
    }
    let (min, max) = match condition.amount_bounds() {
        Some(bounds) => bounds,
        None => return false,
    };
    min.map_or(true, |min| amount >= min) && max.map_or(true, |max| amount <= max)
}

fn text_matches(text: &str, condition: &Condition) -> bool {
    let value = match condition.value.as_deref() {
        Some(value) => value,
        None => return false,
    };
    // An empty operand would trivially match everything except for `equals`
    if value.is_empty() && condition.condition_type != ConditionType::Equals {
        return false;
    }

    if condition.condition_type == ConditionType::Regex {
        return compile_pattern(value, condition.case_sensitive)
            .map(|re| re.is_match(text))
            .unwrap_or(false);
    }

    let (text, value): (Cow<str>, Cow<str>) = if condition.case_sensitive {
        (Cow::Borrowed(text), Cow::Borrowed(value))
    } else {
        (Cow::Owned(text.to_lowercase()), Cow::Owned(value.to_lowercase()))
    };

    match condition.condition_type {
        ConditionType::Contains => text.contains(&*value),
        ConditionType::Equals => text == value,
        ConditionType::StartsWith => text.starts_with(&*value),
        ConditionType::EndsWith => text.ends_with(&*value),
        ConditionType::Regex | ConditionType::AmountRange | ConditionType::Unknown(_) => false,
    }
}
