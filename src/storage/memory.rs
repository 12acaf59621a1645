//! In-memory storage implementation for tests and embedding.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::{Account, BalanceSnapshot, Id, Transaction, User};

use super::{dedup_snapshots, dedup_transactions, Storage};

/// In-memory backend. Keeps the same append/dedup-on-read contract as
/// [`super::JsonFileStorage`] so tests exercise identical semantics.
pub struct MemoryStorage {
    users: Mutex<HashMap<Id, User>>,
    accounts: Mutex<HashMap<Id, Vec<Account>>>,
    transactions: Mutex<HashMap<Id, Vec<Transaction>>>,
    snapshots: Mutex<HashMap<(Id, Id), Vec<BalanceSnapshot>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn get_user(&self, id: &Id) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.get(id).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().await;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: &Id) -> Result<bool> {
        let mut users = self.users.lock().await;
        Ok(users.remove(id).is_some())
    }

    async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_account(&self, user_id: &Id, account_id: &Id) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .get(user_id)
            .and_then(|rows| rows.iter().find(|a| &a.id == account_id).cloned()))
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        let rows = accounts.entry(account.user_id.clone()).or_default();
        match rows.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => rows.push(account.clone()),
        }
        Ok(())
    }

    async fn delete_accounts(&self, user_id: &Id) -> Result<usize> {
        let mut accounts = self.accounts.lock().await;
        let removed = accounts.remove(user_id).map(|rows| rows.len()).unwrap_or(0);
        // Balance series live under the account in file storage; match that.
        let mut snapshots = self.snapshots.lock().await;
        snapshots.retain(|(owner, _), _| owner != user_id);
        Ok(removed)
    }

    async fn get_transactions(&self, user_id: &Id) -> Result<Vec<Transaction>> {
        let txns = self.transactions.lock().await;
        Ok(dedup_transactions(
            txns.get(user_id).cloned().unwrap_or_default(),
        ))
    }

    async fn append_transactions(&self, user_id: &Id, new_txns: &[Transaction]) -> Result<()> {
        let mut txns = self.transactions.lock().await;
        txns.entry(user_id.clone())
            .or_default()
            .extend(new_txns.iter().cloned());
        Ok(())
    }

    async fn delete_transactions(&self, user_id: &Id) -> Result<usize> {
        let mut txns = self.transactions.lock().await;
        let removed = txns
            .remove(user_id)
            .map(|rows| dedup_transactions(rows).len())
            .unwrap_or(0);
        Ok(removed)
    }

    async fn get_balance_snapshots(
        &self,
        user_id: &Id,
        account_id: &Id,
    ) -> Result<Vec<BalanceSnapshot>> {
        let snapshots = self.snapshots.lock().await;
        Ok(dedup_snapshots(
            snapshots
                .get(&(user_id.clone(), account_id.clone()))
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn append_balance_snapshot(
        &self,
        user_id: &Id,
        snapshot: &BalanceSnapshot,
    ) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots
            .entry((user_id.clone(), snapshot.account_id.clone()))
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn tx(id: &str, name: &str) -> Transaction {
        Transaction {
            id: Id::from_string(id),
            account_id: Id::from_string("acct-1"),
            user_id: Id::from_string("user-1"),
            amount: Decimal::new(5, 0),
            currency: "USD".to_string(),
            name: name.to_string(),
            original_name: name.to_string(),
            merchant_name: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            category: None,
            subcategory: None,
            category_icon_url: None,
            pending: false,
            location_city: None,
            location_region: None,
            location_country: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reads_collapse_duplicate_transaction_ids_last_write_wins() -> Result<()> {
        let storage = MemoryStorage::new();
        let user = Id::from_string("user-1");

        storage
            .append_transactions(&user, &[tx("tx-1", "first"), tx("tx-2", "other")])
            .await?;
        storage
            .append_transactions(&user, &[tx("tx-1", "second")])
            .await?;

        let rows = storage.get_transactions(&user).await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows.iter().find(|t| t.id.as_str() == "tx-1").unwrap().name,
            "second"
        );
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_reads_collapse_duplicate_dates() -> Result<()> {
        let storage = MemoryStorage::new();
        let user = Id::from_string("user-1");
        let acct = Id::from_string("acct-1");
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let first = BalanceSnapshot::new(acct.clone(), date, Decimal::new(100, 0), Utc::now());
        let second = BalanceSnapshot::new(acct.clone(), date, Decimal::new(250, 0), Utc::now());
        storage.append_balance_snapshot(&user, &first).await?;
        storage.append_balance_snapshot(&user, &second).await?;

        let snapshots = storage.get_balance_snapshots(&user, &acct).await?;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].amount, Decimal::new(250, 0));
        Ok(())
    }
}
