//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod condition;
mod rule;
mod transaction;
pub mod result;

pub use condition::{AmountBound, Column, Condition, ConditionType};
pub use rule::{Rule, RuleValidationError, DEFAULT_PRIORITY};
pub use transaction::{Transaction, TransactionSnapshot, AMOUNT_SCALE};
