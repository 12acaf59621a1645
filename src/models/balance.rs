use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// A point-in-time recorded value of an account's balance, keyed by calendar
/// date. At most one snapshot exists per `(account, date)`; writing the same
/// date again overwrites the amount and bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub account_id: Id,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    pub fn new(account_id: Id, date: NaiveDate, amount: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            date,
            amount,
            created_at: at,
            updated_at: at,
        }
    }
}
