//! Services layer - business logic orchestration
//!
//! Services hold an `Arc<dyn Repository>` and are independent of the
//! concrete storage adapter.

mod categorize;
mod logging;
mod migration;
mod rules;
mod transactions;

pub use categorize::{Assignment, CategorizeOptions, CategorizeResult, CategorizeService};
pub use logging::{now_ms, EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService, Migrations};
pub use rules::{InvalidRuleEntry, RuleListing, RuleService, RULE_KEY_PREFIX};
pub use transactions::{CreatedTransaction, TransactionService};
