//! Read-only summaries over the ledger.
//!
//! Nothing here mutates storage; every query recomputes from the current
//! transaction set, so a read may observe a ledger that is concurrently being
//! extended. Outflow/inflow follow the source's sign convention: positive
//! amounts are outflows (spend), negative amounts are inflows (income).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::categories::normalize;
use crate::clock::Clock;
use crate::error::Result;
use crate::ledger::{sort_newest_first, Ledger};
use crate::models::{Direction, Id, Transaction};
use crate::storage::Storage;

/// Read-only aggregation layer over a [`Ledger`]'s storage.
pub struct Aggregator {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

/// One row of a category breakdown, ordered by `total_spent` descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total_spent: Decimal,
    pub avg_amount: Decimal,
    /// Only populated for date-range breakdowns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
}

/// Per-category slice of one month's spending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCategory {
    pub category: String,
    pub amount: Decimal,
    pub count: usize,
}

/// One `"YYYY-MM"` bucket of the monthly overview, newest month first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub total_spent: Decimal,
    pub total_income: Decimal,
    /// Number of outflow transactions in the month (the overview is a
    /// spending view; inflows contribute to `total_income` only).
    pub transaction_count: usize,
    pub categories: Vec<MonthCategory>,
}

/// Presentation-shaped transaction row: raw `category` replaced by its
/// display form, `description` aliasing the editable name, direction made
/// explicit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    pub id: Id,
    pub account_id: Id,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    pub date: NaiveDate,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub pending: bool,
    pub direction: Direction,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            account_id: tx.account_id.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            description: tx.name.clone(),
            merchant_name: tx.merchant_name.clone(),
            date: tx.date,
            category: normalize(tx.category.as_deref()),
            subcategory: tx.subcategory.clone(),
            pending: tx.pending,
            direction: tx.direction(),
        }
    }
}

/// A date-range slice of the ledger with an optional attached breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RangeSummary {
    pub start_date: NaiveDate,
    /// `start_date + days`; the window is inclusive on both ends.
    pub end_date: NaiveDate,
    pub transactions: Vec<TransactionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryTotal>>,
}

/// Single-row rollup for a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub account_count: usize,
    pub transaction_count: usize,
    pub total_spent: Decimal,
    pub total_income: Decimal,
    pub last_transaction_date: Option<NaiveDate>,
}

impl Aggregator {
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            storage: ledger.storage().clone(),
            clock: ledger.clock().clone(),
        }
    }

    /// Spending grouped by display category: outflows only, rows with no
    /// source category excluded from grouping (they remain in the ledger and
    /// in [`Self::user_stats`]).
    pub async fn category_breakdown(&self, user_id: &Id) -> Result<Vec<CategoryTotal>> {
        let transactions = self.storage.get_transactions(user_id).await?;
        Ok(breakdown(transactions.iter(), false))
    }

    /// Category breakdown restricted to `[start, start + days]`, with
    /// per-category max/min added for the range view.
    pub async fn category_breakdown_range(
        &self,
        user_id: &Id,
        start_date: NaiveDate,
        days: u64,
    ) -> Result<Vec<CategoryTotal>> {
        let end_date = add_days(start_date, days);
        let transactions = self.storage.get_transactions(user_id).await?;
        Ok(breakdown(
            transactions
                .iter()
                .filter(|t| t.date >= start_date && t.date <= end_date),
            true,
        ))
    }

    /// Month-by-month rollup of the last `months` calendar months, newest
    /// month first.
    pub async fn monthly_summary(
        &self,
        user_id: &Id,
        months: u32,
    ) -> Result<Vec<MonthlySummary>> {
        let cutoff = months_before(self.clock.today(), months);
        let transactions = self.storage.get_transactions(user_id).await?;

        let mut by_month: HashMap<String, MonthlySummary> = HashMap::new();
        for tx in transactions.iter().filter(|t| t.date >= cutoff) {
            let month = tx.date.format("%Y-%m").to_string();
            let entry = by_month
                .entry(month.clone())
                .or_insert_with(|| MonthlySummary {
                    month,
                    total_spent: Decimal::ZERO,
                    total_income: Decimal::ZERO,
                    transaction_count: 0,
                    categories: Vec::new(),
                });
            match tx.direction() {
                Direction::Outflow => {
                    entry.total_spent += tx.amount;
                    entry.transaction_count += 1;
                    if tx.category.is_some() {
                        let display = normalize(tx.category.as_deref());
                        match entry.categories.iter_mut().find(|c| c.category == display) {
                            Some(cat) => {
                                cat.amount += tx.amount;
                                cat.count += 1;
                            }
                            None => entry.categories.push(MonthCategory {
                                category: display,
                                amount: tx.amount,
                                count: 1,
                            }),
                        }
                    }
                }
                Direction::Inflow => entry.total_income += tx.amount.abs(),
                Direction::Zero => {}
            }
        }

        let mut summaries: Vec<MonthlySummary> = by_month.into_values().collect();
        for summary in &mut summaries {
            summary.categories.sort_by(|a, b| {
                b.amount
                    .cmp(&a.amount)
                    .then_with(|| a.category.cmp(&b.category))
            });
        }
        // Lexicographic compare on "YYYY-MM" is chronological compare.
        summaries.sort_by(|a, b| b.month.cmp(&a.month));
        Ok(summaries)
    }

    /// Transactions dated within `[start, start + days]` inclusive, newest
    /// first, with the window's category breakdown attached on request.
    pub async fn range_summary(
        &self,
        user_id: &Id,
        start_date: NaiveDate,
        days: u64,
        include_categories: bool,
        limit: Option<usize>,
    ) -> Result<RangeSummary> {
        let end_date = add_days(start_date, days);
        let mut transactions: Vec<Transaction> = self
            .storage
            .get_transactions(user_id)
            .await?
            .into_iter()
            .filter(|t| t.date >= start_date && t.date <= end_date)
            .collect();
        sort_newest_first(&mut transactions);

        let categories = if include_categories {
            Some(breakdown(transactions.iter(), true))
        } else {
            None
        };

        let mut views: Vec<TransactionView> =
            transactions.iter().map(TransactionView::from).collect();
        if let Some(limit) = limit {
            views.truncate(limit);
        }

        Ok(RangeSummary {
            start_date,
            end_date,
            transactions: views,
            categories,
        })
    }

    /// Single-row rollup: distinct accounts seen in transactions, row count,
    /// sign-split totals, and the most recent transaction date.
    pub async fn user_stats(&self, user_id: &Id) -> Result<UserStats> {
        let transactions = self.storage.get_transactions(user_id).await?;

        let mut accounts: Vec<&Id> = transactions.iter().map(|t| &t.account_id).collect();
        accounts.sort();
        accounts.dedup();

        let mut total_spent = Decimal::ZERO;
        let mut total_income = Decimal::ZERO;
        for tx in &transactions {
            match tx.direction() {
                Direction::Outflow => total_spent += tx.amount,
                Direction::Inflow => total_income += tx.amount.abs(),
                Direction::Zero => {}
            }
        }

        Ok(UserStats {
            account_count: accounts.len(),
            transaction_count: transactions.len(),
            total_spent,
            total_income,
            last_transaction_date: transactions.iter().map(|t| t.date).max(),
        })
    }
}

fn breakdown<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
    with_extremes: bool,
) -> Vec<CategoryTotal> {
    struct Agg {
        count: usize,
        total: Decimal,
        max: Decimal,
        min: Decimal,
    }

    let mut by_category: HashMap<String, Agg> = HashMap::new();
    for tx in transactions.filter(|t| t.is_outflow() && t.category.is_some()) {
        let display = normalize(tx.category.as_deref());
        let agg = by_category.entry(display).or_insert(Agg {
            count: 0,
            total: Decimal::ZERO,
            max: tx.amount,
            min: tx.amount,
        });
        agg.count += 1;
        agg.total += tx.amount;
        agg.max = agg.max.max(tx.amount);
        agg.min = agg.min.min(tx.amount);
    }

    let mut rows: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, agg)| CategoryTotal {
            category,
            count: agg.count,
            total_spent: agg.total,
            avg_amount: agg.total / Decimal::from(agg.count as i64),
            max_amount: with_extremes.then_some(agg.max),
            min_amount: with_extremes.then_some(agg.min),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_spent
            .cmp(&a.total_spent)
            .then_with(|| a.category.cmp(&b.category))
    });
    rows
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// `months` calendar months before `date`, clamping the day-of-month to what
/// the target month has (2024-03-31 minus one month is 2024-02-29).
fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 - months as i32;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    let mut day = date.day();
    loop {
        if let Some(result) = NaiveDate::from_ymd_opt(year, month0 + 1, day) {
            return result;
        }
        day -= 1;
    }
}
