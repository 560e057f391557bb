//! Category automation rule engine
//!
//! Pure, synchronous functions over in-memory rules and transaction
//! snapshots. Nothing here does I/O or keeps state between calls, so every
//! function can be called from any number of threads.
//!
//! - **condition**: one typed condition against one transaction
//! - **logic**: the AND/OR (UND/ODER) expression language over condition ids
//! - **rule**: one rule against one transaction, plus diagnostics
//! - **selector**: first-match category selection over a rule set

pub mod condition;
pub mod logic;
pub mod rule;
pub mod selector;

pub use condition::evaluate_condition;
pub use logic::{ConditionResults, LogicError, Operator};
pub use rule::{condition_results, diagnose_rule, evaluate_rule, RuleTestResult};
pub use selector::{select, select_detailed, RuleMatch, SelectionOutcome, SkippedRule};
