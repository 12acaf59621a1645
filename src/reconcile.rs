//! Client-side reconciliation of fetched transaction batches.
//!
//! The expense log is a local mirror of what a fetch returned, keyed by date.
//! It is a separate store from the ledger; a client that cannot reach the
//! ledger directly still needs duplicate-free merges of overlapping fetches.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::categories::normalize;
use crate::ingest::SourceTransaction;

/// One mirrored transaction row, carrying the external id used for dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub external_id: String,
    pub amount: Decimal,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub pending: bool,
}

impl ExpenseEntry {
    /// Build an entry from a fetched row. Rows without an external id cannot
    /// be deduplicated and are rejected.
    pub fn from_source(source: &SourceTransaction) -> Option<Self> {
        if source.transaction_id.is_empty() {
            return None;
        }
        Some(Self {
            external_id: source.transaction_id.clone(),
            amount: source.amount,
            description: source.name.clone(),
            category: normalize(
                source
                    .personal_finance_category
                    .as_ref()
                    .and_then(|c| c.primary.as_deref()),
            ),
            subcategory: source
                .personal_finance_category
                .as_ref()
                .and_then(|c| c.detailed.clone()),
            pending: source.pending,
        })
    }
}

/// Counts from one [`ExpenseLog::merge`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// New rows appended to the log.
    pub merged: usize,
    /// Incoming rows whose external id was already recorded for their date.
    pub duplicates: usize,
    /// Incoming rows that could not be converted.
    pub skipped: usize,
}

/// Date-keyed local log of expenses, merged by set union on external id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExpenseLog {
    entries: BTreeMap<NaiveDate, Vec<ExpenseEntry>>,
}

impl ExpenseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fetched batch into the log without creating duplicates.
    ///
    /// The batch is grouped by date; within each date, entries whose external
    /// id is already present are dropped and the rest are appended. Running
    /// the same batch twice therefore changes nothing the second time. Rows
    /// that fail conversion are logged and skipped, never aborting the merge.
    pub fn merge(&mut self, batch: &[SourceTransaction]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        let mut by_date: HashMap<NaiveDate, Vec<ExpenseEntry>> = HashMap::new();
        for source in batch {
            match ExpenseEntry::from_source(source) {
                Some(entry) => by_date.entry(source.date).or_default().push(entry),
                None => {
                    tracing::warn!(
                        date = %source.date,
                        "skipping fetched transaction without an external id"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        for (date, incoming) in by_date {
            let existing = self.entries.entry(date).or_default();
            let mut seen: HashSet<String> = existing
                .iter()
                .map(|entry| entry.external_id.clone())
                .collect();
            for entry in incoming {
                if seen.insert(entry.external_id.clone()) {
                    existing.push(entry);
                    outcome.merged += 1;
                } else {
                    outcome.duplicates += 1;
                }
            }
        }

        outcome
    }

    /// Entries recorded for one date, in insertion order.
    pub fn entries_on(&self, date: NaiveDate) -> &[ExpenseEntry] {
        self.entries.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All dates with at least one entry, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, date: &str, amount: &str) -> SourceTransaction {
        serde_json::from_value(serde_json::json!({
            "transaction_id": id,
            "account_id": "acct-1",
            "amount": amount,
            "name": format!("purchase {id}"),
            "date": date,
        }))
        .unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn merge_unions_by_external_id_within_a_date() {
        let mut log = ExpenseLog::new();
        let first = log.merge(&[source("A", "2024-01-10", "5.00"), source("B", "2024-01-10", "6.00")]);
        assert_eq!(first.merged, 2);

        let second = log.merge(&[source("A", "2024-01-10", "5.00"), source("C", "2024-01-10", "7.00")]);
        assert_eq!(second.merged, 1);
        assert_eq!(second.duplicates, 1);

        let mut ids: Vec<&str> = log
            .entries_on(d("2024-01-10"))
            .iter()
            .map(|e| e.external_id.as_str())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn rerunning_the_same_batch_adds_nothing() {
        let mut log = ExpenseLog::new();
        let batch = [
            source("A", "2024-01-10", "5.00"),
            source("B", "2024-01-11", "6.00"),
        ];
        log.merge(&batch);
        let len_before = log.len();

        let rerun = log.merge(&batch);
        assert_eq!(rerun.merged, 0);
        assert_eq!(rerun.duplicates, 2);
        assert_eq!(log.len(), len_before);
    }

    #[test]
    fn same_id_on_different_dates_is_kept_per_date() {
        let mut log = ExpenseLog::new();
        log.merge(&[
            source("A", "2024-01-10", "5.00"),
            source("A", "2024-01-11", "5.00"),
        ]);
        assert_eq!(log.entries_on(d("2024-01-10")).len(), 1);
        assert_eq!(log.entries_on(d("2024-01-11")).len(), 1);
    }

    #[test]
    fn unconvertible_rows_are_skipped_without_aborting() {
        let mut log = ExpenseLog::new();
        let outcome = log.merge(&[source("", "2024-01-10", "5.00"), source("B", "2024-01-10", "6.00")]);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.merged, 1);
        assert_eq!(log.entries_on(d("2024-01-10")).len(), 1);
    }

    #[test]
    fn categories_are_normalized_at_entry_construction() {
        let mut log = ExpenseLog::new();
        log.merge(&[serde_json::from_value(serde_json::json!({
            "transaction_id": "A",
            "account_id": "acct-1",
            "amount": "5.00",
            "name": "lunch",
            "date": "2024-01-10",
            "personal_finance_category": { "primary": "FAST_FOOD" }
        }))
        .unwrap()]);
        assert_eq!(log.entries_on(d("2024-01-10"))[0].category, "dining");
    }
}
