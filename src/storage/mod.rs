mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use std::collections::HashMap;

use crate::models::{Account, BalanceSnapshot, Id, Transaction, User};

/// Storage backend for per-user ledger data.
///
/// Transactions and balance snapshots are append-oriented: a backend may keep
/// every write and reconcile duplicates at read time, as long as reads honor
/// last-write-wins by id (transactions) and by date (snapshots). That is what
/// makes re-ingestion of the same externally issued id an upsert.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn get_user(&self, id: &Id) -> Result<Option<User>>;
    async fn save_user(&self, user: &User) -> Result<()>;
    async fn delete_user(&self, id: &Id) -> Result<bool>;

    // Accounts
    async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>>;
    async fn get_account(&self, user_id: &Id, account_id: &Id) -> Result<Option<Account>>;
    async fn save_account(&self, account: &Account) -> Result<()>;
    async fn delete_accounts(&self, user_id: &Id) -> Result<usize>;

    // Transactions, deduplicated by id (last write wins)
    async fn get_transactions(&self, user_id: &Id) -> Result<Vec<Transaction>>;
    async fn append_transactions(&self, user_id: &Id, txns: &[Transaction]) -> Result<()>;
    async fn delete_transactions(&self, user_id: &Id) -> Result<usize>;

    // Balance snapshots, deduplicated by date (last write wins)
    async fn get_balance_snapshots(
        &self,
        user_id: &Id,
        account_id: &Id,
    ) -> Result<Vec<BalanceSnapshot>>;
    async fn append_balance_snapshot(
        &self,
        user_id: &Id,
        snapshot: &BalanceSnapshot,
    ) -> Result<()>;
}

/// Collapse an append log of transactions to one row per id, keeping the
/// position of the first write and the contents of the last.
pub(crate) fn dedup_transactions(txns: Vec<Transaction>) -> Vec<Transaction> {
    let mut by_id: HashMap<Id, usize> = HashMap::new();
    let mut deduped: Vec<Transaction> = Vec::new();
    for txn in txns {
        if let Some(idx) = by_id.get(&txn.id).copied() {
            deduped[idx] = txn;
        } else {
            by_id.insert(txn.id.clone(), deduped.len());
            deduped.push(txn);
        }
    }
    deduped
}

/// Collapse an append log of balance snapshots to one row per date.
pub(crate) fn dedup_snapshots(snapshots: Vec<BalanceSnapshot>) -> Vec<BalanceSnapshot> {
    let mut by_date: HashMap<chrono::NaiveDate, usize> = HashMap::new();
    let mut deduped: Vec<BalanceSnapshot> = Vec::new();
    for snapshot in snapshots {
        if let Some(idx) = by_date.get(&snapshot.date).copied() {
            deduped[idx] = snapshot;
        } else {
            by_date.insert(snapshot.date, deduped.len());
            deduped.push(snapshot);
        }
    }
    deduped
}
