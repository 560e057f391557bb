//! Transaction domain model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::condition::Column;

/// Decimal places stored for transaction amounts
pub const AMOUNT_SCALE: u32 = 2;

/// Read-only view of the transaction fields a condition can test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSnapshot {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recipient_applicant: Option<String>,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub iban: Option<String>,
}

impl TransactionSnapshot {
    pub fn new(description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            description: description.into(),
            recipient_applicant: None,
            amount,
            iban: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient_applicant = Some(recipient.into());
        self
    }

    pub fn with_iban(mut self, iban: impl Into<String>) -> Self {
        self.iban = Some(iban.into());
        self
    }

    /// Text value of a string column; `None` for absent fields, the amount
    /// column and unknown columns
    pub fn text(&self, column: &Column) -> Option<&str> {
        match column {
            Column::Description => Some(self.description.as_str()),
            Column::RecipientApplicant => self.recipient_applicant.as_deref(),
            Column::Iban => self.iban.as_deref(),
            Column::Amount | Column::Unknown(_) => None,
        }
    }
}

/// A booked transaction belonging to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: String,
    pub amount: Decimal,
    pub description: String,
    /// Counterparty name as delivered by the bank
    pub recipient_applicant: Option<String>,
    /// Counterparty IBAN, normalized (no whitespace, uppercase)
    pub iban: Option<String>,
    pub transaction_date: NaiveDate,
    /// Assigned category, `None` while the transaction is in the backlog
    pub category: Option<String>,
    /// Rule that assigned `category`, `None` for manual assignments
    pub category_rule_id: Option<String>,
}

impl Transaction {
    /// Create a new uncategorized transaction
    pub fn new(
        id: Uuid,
        account_id: impl Into<String>,
        amount: Decimal,
        description: impl Into<String>,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            account_id: account_id.into(),
            amount,
            description: description.into(),
            recipient_applicant: None,
            iban: None,
            transaction_date,
            category: None,
            category_rule_id: None,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        let recipient = recipient.into();
        self.recipient_applicant = if recipient.trim().is_empty() {
            None
        } else {
            Some(recipient)
        };
        self
    }

    pub fn with_iban(mut self, iban: &str) -> Self {
        self.iban = Self::normalize_iban(iban);
        self
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }

    /// True when the amount fits the stored precision without rounding
    pub fn has_storable_amount(&self) -> bool {
        self.amount.normalize().scale() <= AMOUNT_SCALE
    }

    /// The fields rules are evaluated against
    pub fn snapshot(&self) -> TransactionSnapshot {
        TransactionSnapshot {
            description: self.description.clone(),
            recipient_applicant: self.recipient_applicant.clone(),
            amount: self.amount,
            iban: self.iban.clone(),
        }
    }

    /// Strip whitespace and uppercase; empty input yields `None`
    pub fn normalize_iban(iban: &str) -> Option<String> {
        let normalized: String = iban
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }
}
