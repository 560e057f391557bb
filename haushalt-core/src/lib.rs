//! Haushalt Core - rule-based transaction categorization
//!
//! The crate follows a hexagonal layout:
//!
//! - **domain**: rules, conditions and transactions
//! - **engine**: pure rule evaluation and category selection
//! - **ports**: the `Repository` trait the services depend on
//! - **services**: rule storage, categorization runs, logging
//! - **adapters**: DuckDB and in-memory repositories

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::Repository;
use services::*;

pub use domain::result::Error;
pub use domain::{Column, Condition, ConditionType, Rule, Transaction, TransactionSnapshot};
pub use engine::{RuleMatch, RuleTestResult, SelectionOutcome};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for Haushalt operations
///
/// Holds the configuration, the repository and every service built on it.
pub struct HaushaltContext {
    pub config: Config,
    pub repository: Arc<dyn Repository>,
    pub rule_service: RuleService,
    pub categorize_service: CategorizeService,
    pub transaction_service: TransactionService,
}

impl HaushaltContext {
    /// Open `haushalt.duckdb` in `data_dir` and apply pending migrations
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let repository = DuckDbRepository::new(&data_dir.join("haushalt.duckdb"))?;
        repository.run_migrations()?;

        Ok(Self::with_repository(config, Arc::new(repository)))
    }

    /// Build the services over an existing repository
    pub fn with_repository(config: Config, repository: Arc<dyn Repository>) -> Self {
        let options = CategorizeOptions {
            recategorize: config.recategorize,
            skip_invalid_rules: config.skip_invalid_rules,
        };

        Self {
            rule_service: RuleService::new(Arc::clone(&repository)),
            categorize_service: CategorizeService::new(Arc::clone(&repository), options),
            transaction_service: TransactionService::new(
                Arc::clone(&repository),
                config.auto_categorize,
                config.skip_invalid_rules,
            ),
            config,
            repository,
        }
    }
}
