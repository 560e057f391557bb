//! Rules command - manage category rules

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use rust_decimal::Decimal;

use super::{get_context, get_logger, log_event, read_input};
use crate::output;
use haushalt_core::services::RuleService;
use haushalt_core::{LogEvent, Rule, TransactionSnapshot};

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List stored rules in evaluation order
    List {
        /// Include disabled rules
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or replace a rule from a JSON document
    Add {
        /// Read the rule from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a rule
    Remove {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Enable a rule
    Enable { id: String },
    /// Disable a rule without deleting it
    Disable { id: String },
    /// Evaluate a rule against a sample transaction
    Test {
        /// Stored rule id
        id: Option<String>,
        /// Read an unsaved rule from a file
        #[arg(short, long, conflicts_with = "id")]
        file: Option<PathBuf>,
        #[arg(long)]
        description: String,
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        #[arg(long)]
        iban: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a condition logic expression
    CheckLogic {
        expression: String,
        /// Condition ids the expression may reference
        #[arg(long, value_delimiter = ',')]
        ids: Vec<u32>,
    },
}

pub fn run(command: RulesCommands) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("rules"));

    match command {
        RulesCommands::List { all, json } => run_list(all, json),
        RulesCommands::Add { file, json } => {
            let ctx = get_context()?;
            let document = read_input(file.as_deref())?;
            let rule = ctx.rule_service.save_rule_json(&document)?;
            log_event(&logger, LogEvent::new("rule_saved").with_rule(&rule.id));

            if json {
                println!("{}", serde_json::to_string_pretty(&rule)?);
            } else {
                output::success(&format!("Saved rule '{}' ({})", rule.name, rule.id));
            }
            Ok(())
        }
        RulesCommands::Remove { id, force } => {
            let ctx = get_context()?;
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Delete rule '{}'?", id))
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            if ctx.rule_service.delete_rule(&id)? {
                log_event(&logger, LogEvent::new("rule_deleted").with_rule(&id));
                output::success(&format!("Deleted rule '{}'", id));
                Ok(())
            } else {
                Err(anyhow!("Rule '{}' not found", id))
            }
        }
        RulesCommands::Enable { id } => set_enabled(&id, true),
        RulesCommands::Disable { id } => set_enabled(&id, false),
        RulesCommands::Test {
            id,
            file,
            description,
            recipient,
            amount,
            iban,
            json,
        } => {
            let ctx = get_context()?;
            let rule = match (id, file) {
                (Some(id), _) => ctx
                    .rule_service
                    .get_rule(&id)?
                    .ok_or_else(|| anyhow!("Rule '{}' not found", id))?,
                (None, file) => Rule::from_json(&read_input(file.as_deref())?)?,
            };

            let amount: Decimal = amount
                .parse()
                .map_err(|_| anyhow!("Invalid amount '{}'", amount))?;
            let mut snapshot = TransactionSnapshot::new(description, amount);
            snapshot.recipient_applicant = recipient;
            snapshot.iban = iban;

            let result = ctx.rule_service.test_rule(&rule, &snapshot);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Condition", "Type", "Column", "Result"]);
            for condition in &rule.conditions {
                let matched = result.condition_results.get(&condition.id).copied().unwrap_or(false);
                table.add_row(vec![
                    condition.id.to_string(),
                    condition.condition_type.to_string(),
                    condition.column_name.to_string(),
                    if matched {
                        "match".green().to_string()
                    } else {
                        "no match".dimmed().to_string()
                    },
                ]);
            }
            println!("{}", table);

            let logic = rule.condition_logic.as_deref().unwrap_or("(any condition)");
            println!("Logic: {}", logic);
            if let Some(error) = &result.logic_error {
                println!("{}", format!("Logic error: {}", error).red());
            }
            for warning in &result.warnings {
                output::warning(&format!("Warning: {}", warning));
            }

            if result.matched {
                output::success(&format!("Rule matches -> {}", rule.category));
            } else {
                println!("{}", "Rule does not match".yellow());
            }
            Ok(())
        }
        RulesCommands::CheckLogic { expression, ids } => {
            match RuleService::check_logic(&expression, &ids) {
                Ok(()) => {
                    output::success("Expression is valid");
                    Ok(())
                }
                Err(message) => Err(anyhow!("Invalid expression: {}", message)),
            }
        }
    }
}

fn run_list(all: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut listing = ctx.rule_service.list_rules()?;
    if !all {
        listing.rules.retain(|rule| rule.enabled);
    }
    // Evaluation order: priority descending, storage order for ties
    listing.rules.sort_by(|a, b| b.priority.cmp(&a.priority));

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.rules.is_empty() {
        println!("No rules found.");
    } else {
        let mut table = output::create_table();
        table.set_header(vec![
            "ID", "Name", "Category", "Priority", "Accounts", "Logic", "Enabled",
        ]);
        for rule in &listing.rules {
            let accounts = if rule.accounts.is_empty() {
                "all".to_string()
            } else {
                rule.accounts.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            table.add_row(vec![
                rule.id.clone(),
                rule.name.clone(),
                rule.category.clone(),
                rule.priority.to_string(),
                accounts,
                output::or_dash(rule.condition_logic.as_deref()),
                if rule.enabled { "yes".to_string() } else { "no".dimmed().to_string() },
            ]);
        }
        println!("{}", table);
    }

    for invalid in &listing.invalid {
        output::warning(&format!("Skipping {}: {}", invalid.key, invalid.error));
    }
    Ok(())
}

fn set_enabled(id: &str, enabled: bool) -> Result<()> {
    let ctx = get_context()?;
    let rule = ctx.rule_service.set_enabled(id, enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };
    output::success(&format!("Rule '{}' {}", rule.name, state));
    Ok(())
}
