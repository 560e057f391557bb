//! New command - create new records

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Input;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{get_context, get_logger, log_event};
use crate::output;
use haushalt_core::{LogEvent, Transaction};

#[derive(Subcommand)]
pub enum NewCommands {
    /// Add a manual transaction
    Transaction {
        /// Account ID
        #[arg(long)]
        account: Option<String>,
        /// Signed amount, negative for spending
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Counterparty name
        #[arg(long)]
        recipient: Option<String>,
        /// Counterparty IBAN
        #[arg(long)]
        iban: Option<String>,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: NewCommands) -> Result<()> {
    match command {
        NewCommands::Transaction {
            account,
            amount,
            description,
            recipient,
            iban,
            date,
            json,
        } => run_transaction(account, amount, description, recipient, iban, date, json),
    }
}

fn prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(label).interact_text()?),
    }
}

fn run_transaction(
    account: Option<String>,
    amount: Option<String>,
    description: Option<String>,
    recipient: Option<String>,
    iban: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command("new transaction"));

    let ctx = get_context()?;

    let account = prompt(account, "Account ID")?;
    let amount_str = prompt(amount, "Amount")?;
    let description = prompt(description, "Description")?;

    let amount: Decimal = amount_str
        .parse()
        .map_err(|_| anyhow!("Invalid amount '{}'", amount_str))?;
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .map_err(|_| anyhow!("Invalid date format. Use YYYY-MM-DD"))?,
        None => Local::now().date_naive(),
    };

    let mut transaction = Transaction::new(Uuid::new_v4(), account, amount, description, date);
    if let Some(recipient) = recipient {
        transaction = transaction.with_recipient(recipient);
    }
    if let Some(iban) = iban {
        transaction = transaction.with_iban(&iban);
    }

    let created = ctx.transaction_service.create(transaction)?;

    for skipped in &created.skipped_rules {
        log_event(
            &logger,
            LogEvent::new("rule_skipped")
                .with_command("new transaction")
                .with_rule(skipped.rule_id())
                .with_error(&skipped.error),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
        return Ok(());
    }

    let tx = &created.transaction;
    output::success("Transaction created");
    println!("  ID: {}", tx.id);
    println!("  Account: {}", tx.account_id);
    println!("  Amount: {}", output::format_amount(tx.amount));
    println!("  Date: {}", tx.transaction_date);
    match &created.matched_rule {
        Some(matched) => println!(
            "  Category: {} {}",
            matched.category.green(),
            format!("(rule '{}')", matched.rule_name).dimmed()
        ),
        None => println!("  Category: {}", "uncategorized".dimmed()),
    }
    for skipped in &created.skipped_rules {
        output::warning(&format!("Skipped {}: {}", skipped.key, skipped.error));
    }

    Ok(())
}
