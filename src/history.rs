//! Per-account balance time series and derived percent changes.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::models::{BalanceSnapshot, Id};
use crate::storage::Storage;

/// Tracks `(account, date) -> amount` snapshots and computes display deltas.
///
/// Snapshots share the ledger's storage. A second write for the same date
/// overwrites the first; the series never holds two values for one day.
pub struct BalanceHistory {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

/// One point of the history view, with the change against the previous point.
#[derive(Debug, Clone, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Percent change vs the preceding point. Absent for the first point and
    /// whenever the preceding amount is zero.
    pub period_change: Option<Decimal>,
}

impl BalanceHistory {
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            storage: ledger.storage().clone(),
            clock: ledger.clock().clone(),
        }
    }

    /// Record the balance of `account_id` on `date`, overwriting any value
    /// already held for that date. The original recording time survives an
    /// overwrite; only `updated_at` moves.
    pub async fn record_snapshot(
        &self,
        user_id: &Id,
        account_id: &Id,
        date: NaiveDate,
        amount: Decimal,
    ) -> Result<()> {
        let existing = self.storage.get_balance_snapshots(user_id, account_id).await?;
        let now = self.clock.now();
        let mut snapshot = BalanceSnapshot::new(account_id.clone(), date, amount, now);
        if let Some(prior) = existing.iter().find(|s| s.date == date) {
            snapshot.created_at = prior.created_at;
        }
        self.storage
            .append_balance_snapshot(user_id, &snapshot)
            .await?;
        Ok(())
    }

    /// The full series for an account in date order, each point annotated
    /// with its change against the previous one.
    pub async fn history(&self, user_id: &Id, account_id: &Id) -> Result<Vec<BalancePoint>> {
        let series = self.sorted(user_id, account_id).await?;
        let mut points = Vec::with_capacity(series.len());
        for (idx, snapshot) in series.iter().enumerate() {
            let period_change = idx
                .checked_sub(1)
                .and_then(|prev| percent_change(series[prev].amount, snapshot.amount));
            points.push(BalancePoint {
                date: snapshot.date,
                amount: snapshot.amount,
                period_change,
            });
        }
        Ok(points)
    }

    /// Percent change of the snapshot on `date` against the snapshot
    /// immediately before it. `None` when `date` has no snapshot, has no
    /// predecessor, or the predecessor's amount is zero.
    pub async fn period_change(
        &self,
        user_id: &Id,
        account_id: &Id,
        date: NaiveDate,
    ) -> Result<Option<Decimal>> {
        let series = self.sorted(user_id, account_id).await?;
        let Some(idx) = series.iter().position(|s| s.date == date) else {
            return Ok(None);
        };
        Ok(idx
            .checked_sub(1)
            .and_then(|prev| percent_change(series[prev].amount, series[idx].amount)))
    }

    /// Latest snapshot within the given month against the last snapshot
    /// strictly before the month begins. A missing or zero baseline yields
    /// `None` rather than a runaway percent.
    pub async fn month_over_month(
        &self,
        user_id: &Id,
        account_id: &Id,
        year: i32,
        month: u32,
    ) -> Result<Option<Decimal>> {
        let Some(month_start) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return Ok(None);
        };
        let series = self.sorted(user_id, account_id).await?;

        let current = series.iter().rev().find(|s| in_month(s.date, year, month));
        let baseline = series.iter().rev().find(|s| s.date < month_start);

        Ok(match (baseline, current) {
            (Some(baseline), Some(current)) => percent_change(baseline.amount, current.amount),
            _ => None,
        })
    }

    /// Percent change from the first snapshot ever recorded to the latest.
    /// Needs at least two snapshots and a nonzero first value.
    pub async fn all_time_change(
        &self,
        user_id: &Id,
        account_id: &Id,
    ) -> Result<Option<Decimal>> {
        let series = self.sorted(user_id, account_id).await?;
        match (series.first(), series.last()) {
            (Some(first), Some(last)) if series.len() >= 2 => {
                Ok(percent_change(first.amount, last.amount))
            }
            _ => Ok(None),
        }
    }

    async fn sorted(&self, user_id: &Id, account_id: &Id) -> Result<Vec<BalanceSnapshot>> {
        let mut series = self.storage.get_balance_snapshots(user_id, account_id).await?;
        series.sort_by_key(|s| s.date);
        Ok(series)
    }
}

fn in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    use chrono::Datelike;
    date.year() == year && date.month() == month
}

fn percent_change(from: Decimal, to: Decimal) -> Option<Decimal> {
    if from.is_zero() {
        return None;
    }
    Some((to - from) / from * Decimal::ONE_HUNDRED)
}
