//! Transactions command - list stored transactions

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use haushalt_core::ports::TransactionFilter;

pub fn run(account: Option<String>, uncategorized: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let filter = TransactionFilter {
        account_id: account,
        uncategorized_only: uncategorized,
    };
    let transactions = ctx.transaction_service.list(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Date",
        "Account",
        "Amount",
        "Description",
        "Recipient",
        "Category",
        "ID",
    ]);
    for tx in &transactions {
        let category = match &tx.category {
            Some(category) => category.clone(),
            None => "-".dimmed().to_string(),
        };
        table.add_row(vec![
            tx.transaction_date.to_string(),
            tx.account_id.clone(),
            output::format_amount(tx.amount),
            tx.description.clone(),
            output::or_dash(tx.recipient_applicant.as_deref()),
            category,
            tx.id.to_string(),
        ]);
    }
    println!("{}", table);
    println!("{} transactions", transactions.len());

    Ok(())
}
