//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn warning(msg: &str) {
    eprintln!("{}", msg.yellow());
}

pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Amount with two decimals, negative amounts in red
pub fn format_amount(amount: Decimal) -> String {
    let text = format!("{:.2}", amount);
    if amount.is_sign_negative() {
        text.red().to_string()
    } else {
        text
    }
}

/// Placeholder for missing optional values
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
