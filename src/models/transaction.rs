use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{account::default_currency, Id};

/// A single ledger transaction mirrored from the aggregator source.
///
/// Sign convention (load-bearing, inherited from the source): a positive
/// `amount` is an outflow/expense, a negative `amount` is an inflow/income.
/// Every aggregate in this crate applies that rule; see [`Direction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    pub account_id: Id,
    /// Denormalized owner, so per-user queries never need the account row.
    pub user_id: Id,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub name: String,
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    /// Calendar date of the transaction; the source supplies no time of day.
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_icon_url: Option<String>,
    /// Pending settles by the source resending the same transaction id with
    /// `pending: false`; re-ingestion replaces the whole row.
    #[serde(default)]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transaction direction inferred from the amount sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outflow,
    Inflow,
    Zero,
}

impl Transaction {
    pub fn direction(&self) -> Direction {
        if self.amount > Decimal::ZERO {
            Direction::Outflow
        } else if self.amount < Decimal::ZERO {
            Direction::Inflow
        } else {
            Direction::Zero
        }
    }

    pub fn is_outflow(&self) -> bool {
        self.direction() == Direction::Outflow
    }

    pub fn is_inflow(&self) -> bool {
        self.direction() == Direction::Inflow
    }
}
