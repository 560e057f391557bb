//! Categorize command - run category rules over the backlog

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, log_event};
use crate::output;
use haushalt_core::LogEvent;

pub fn run(account: Option<String>, dry_run: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("categorize"));

    let ctx = get_context()?;
    let result = match ctx.categorize_service.apply_rules(account.as_deref(), dry_run) {
        Ok(result) => result,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("categorize_failed")
                    .with_command("categorize")
                    .with_error(format!("{:#}", e)),
            );
            return Err(e);
        }
    };

    // Rule ids and errors only; never transaction content
    for invalid in &result.invalid_rules {
        log_event(
            &logger,
            LogEvent::new("rule_skipped")
                .with_command("categorize")
                .with_rule(invalid.rule_id())
                .with_error(&invalid.error),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.assignments.is_empty() {
        let mut table = output::create_table();
        table.set_header(vec!["Transaction", "Account", "Rule", "Category", "Previous"]);
        for assignment in &result.assignments {
            table.add_row(vec![
                assignment.transaction_id.to_string(),
                assignment.account_id.clone(),
                assignment.rule_name.clone(),
                assignment.category.clone(),
                output::or_dash(assignment.previous_category.as_deref()),
            ]);
        }
        println!("{}", table);
    }

    for invalid in &result.invalid_rules {
        output::warning(&format!("Skipped {}: {}", invalid.key, invalid.error));
    }

    let verb = if dry_run { "Would categorize" } else { "Categorized" };
    println!(
        "{} {} of {} transactions using {} rules",
        verb,
        result.transactions_categorized.to_string().green(),
        result.transactions_evaluated,
        result.rules_loaded
    );
    if result.still_uncategorized > 0 {
        output::info(&format!("{} transactions remain uncategorized", result.still_uncategorized));
    }
    if dry_run {
        println!("{}", "Dry run: nothing was saved".dimmed());
    }

    Ok(())
}
