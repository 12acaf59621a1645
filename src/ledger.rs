//! The per-user ledger: idempotent ingestion and ownership-scoped mutation.
//!
//! A [`Ledger`] is constructed once at process start with its storage backend
//! and clock, and passed by handle to everything that needs it. Writes for a
//! single user are serialized through a per-user lock; different users never
//! contend.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::clock::Clock;
use crate::error::{BatchResult, LedgerError, Result};
use crate::ingest::{account_from_source, transaction_from_source, SourceAccount, SourceTransaction};
use crate::models::{Account, BalanceSnapshot, Id, Transaction, User};
use crate::storage::Storage;

/// Fields a user is allowed to edit on an ingested transaction. Everything
/// else (amount, date, identity) belongs to the source and is untouchable.
const PATCHABLE_FIELDS: [&str; 4] = ["name", "merchant_name", "category", "subcategory"];

/// Counts from a completed full wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WipeSummary {
    pub transactions_deleted: usize,
    pub accounts_deleted: usize,
    pub user_deleted: bool,
}

pub struct Ledger {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    user_locks: Mutex<HashMap<Id, Arc<Mutex<()>>>>,
}

impl Ledger {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Serialize writes per user. Lookup and lock acquisition are separate so
    /// one user's long write never blocks another user's.
    async fn write_guard(&self, user_id: &Id) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            // A strong count of 1 means no guard is outstanding; reap those so
            // the map doesn't grow one entry per user ever touched (wipe
            // removes the user's data but would otherwise leave its lock).
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(user_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn user_lock_count(&self) -> usize {
        self.user_locks.lock().await.len()
    }

    /// Create the user row on first observed activity.
    async fn ensure_user(&self, user_id: &Id) -> Result<()> {
        if self.storage.get_user(user_id).await?.is_none() {
            let user = User::new(user_id.clone(), self.clock.now());
            self.storage.save_user(&user).await?;
            tracing::info!(user_id = %user_id, "Created ledger user");
        }
        Ok(())
    }

    /// Insert-or-replace an account by its externally issued id.
    ///
    /// Returns the number of rows affected (replace counts as 1). On replace,
    /// `original_name` and `created_at` keep their first-ingest values; both
    /// are immutable snapshots of the first link.
    pub async fn upsert_account(
        &self,
        user_id: &Id,
        source: &SourceAccount,
        access_credential: SecretString,
    ) -> Result<usize> {
        validate_required("account_id", &source.account_id)?;
        validate_required("type", &source.kind)?;
        validate_required("institution_name", &source.institution_name)?;

        let _guard = self.write_guard(user_id).await;
        self.ensure_user(user_id).await?;

        let mut account = account_from_source(user_id, source, access_credential, self.clock.now());
        let account_id = account.id.clone();
        if let Some(existing) = self.storage.get_account(user_id, &account_id).await? {
            account.original_name = existing.original_name;
            account.created_at = existing.created_at;
            account.name = existing.name;
        }
        self.storage.save_account(&account).await?;
        Ok(1)
    }

    /// Update the display name of an account the user owns.
    ///
    /// Not-found and not-owned are indistinguishable zero-row no-ops, so the
    /// operation is an idempotent patch rather than an error source.
    pub async fn rename_account(
        &self,
        user_id: &Id,
        account_id: &Id,
        new_name: &str,
    ) -> Result<usize> {
        let _guard = self.write_guard(user_id).await;
        let Some(mut account) = self.storage.get_account(user_id, account_id).await? else {
            return Ok(0);
        };
        account.name = new_name.to_string();
        account.updated_at = self.clock.now();
        self.storage.save_account(&account).await?;
        Ok(1)
    }

    /// Ownership-scoped balance refresh, same zero-row no-op contract as
    /// [`Self::rename_account`].
    pub async fn refresh_account_balance(
        &self,
        user_id: &Id,
        account_id: &Id,
        balance: Decimal,
        currency: &str,
    ) -> Result<usize> {
        let _guard = self.write_guard(user_id).await;
        let Some(mut account) = self.storage.get_account(user_id, account_id).await? else {
            return Ok(0);
        };
        account.current_balance = Some(balance);
        account.currency = currency.to_string();
        account.updated_at = self.clock.now();
        self.storage.save_account(&account).await?;
        Ok(1)
    }

    /// Insert-or-replace a transaction by its externally issued id.
    ///
    /// The source resends the same id as a pending transaction settles; the
    /// whole row is replaced, which is how `pending` flips to false without a
    /// dedicated update path.
    pub async fn upsert_transaction(
        &self,
        user_id: &Id,
        source: &SourceTransaction,
    ) -> Result<usize> {
        validate_required("transaction_id", &source.transaction_id)?;
        validate_required("account_id", &source.account_id)?;

        let _guard = self.write_guard(user_id).await;
        self.ensure_user(user_id).await?;
        let tx = transaction_from_source(user_id, source, self.clock.now());
        self.storage.append_transactions(user_id, &[tx]).await?;
        Ok(1)
    }

    /// Ingest a batch, making maximal progress: an individual failure is
    /// recorded and skipped, never aborting the remaining items.
    pub async fn upsert_transactions_batch(
        &self,
        user_id: &Id,
        sources: &[SourceTransaction],
    ) -> Result<BatchResult<String>> {
        let mut result = BatchResult::new();
        for source in sources {
            match self.upsert_transaction(user_id, source).await {
                Ok(_) => result.succeeded.push(source.transaction_id.clone()),
                Err(err) => {
                    tracing::warn!(
                        transaction_id = %source.transaction_id,
                        error = %err,
                        "Skipping transaction in batch ingest",
                    );
                    result.failed.push((source.transaction_id.clone(), err));
                }
            }
        }
        Ok(result)
    }

    /// Apply a user edit to a transaction, restricted to the allow-listed
    /// fields. Keys outside the allow-list are silently dropped; if nothing
    /// allow-listed remains, no write is issued and zero changes are
    /// reported.
    pub async fn update_transaction_fields(
        &self,
        user_id: &Id,
        transaction_id: &Id,
        updates: &serde_json::Value,
    ) -> Result<usize> {
        let patch = TransactionPatch::from_updates(updates);
        if patch.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_guard(user_id).await;
        let transactions = self.storage.get_transactions(user_id).await?;
        let Some(mut tx) = transactions.into_iter().find(|t| &t.id == transaction_id) else {
            return Ok(0);
        };

        patch.apply_to(&mut tx);
        tx.updated_at = self.clock.now();
        self.storage.append_transactions(user_id, &[tx]).await?;
        Ok(1)
    }

    /// Delete everything the user owns: transactions, then accounts, then the
    /// user row. All-or-nothing: if any step fails, prior deletions are
    /// rolled back from an in-memory snapshot and the original error is
    /// surfaced.
    pub async fn wipe_user(&self, user_id: &Id) -> Result<WipeSummary> {
        let _guard = self.write_guard(user_id).await;

        // Snapshot for rollback before touching anything. Balance series live
        // under the account and die with it, so they are captured too.
        let accounts = self.storage.list_accounts(user_id).await?;
        let transactions = self.storage.get_transactions(user_id).await?;
        let mut balances = Vec::new();
        for account in &accounts {
            let series = self
                .storage
                .get_balance_snapshots(user_id, &account.id)
                .await?;
            balances.extend(series);
        }

        // Children before parent, respecting the account -> user relationship.
        let transactions_deleted = self.storage.delete_transactions(user_id).await?;

        let accounts_deleted = match self.storage.delete_accounts(user_id).await {
            Ok(count) => count,
            Err(err) => {
                self.restore(user_id, &accounts, &transactions, &balances).await;
                return Err(err.into());
            }
        };

        let user_deleted = match self.storage.delete_user(user_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                self.restore(user_id, &accounts, &transactions, &balances).await;
                return Err(err.into());
            }
        };

        tracing::info!(
            user_id = %user_id,
            transactions_deleted,
            accounts_deleted,
            "Wiped all ledger data for user",
        );
        Ok(WipeSummary {
            transactions_deleted,
            accounts_deleted,
            user_deleted,
        })
    }

    async fn restore(
        &self,
        user_id: &Id,
        accounts: &[Account],
        transactions: &[Transaction],
        balances: &[BalanceSnapshot],
    ) {
        for account in accounts {
            if let Err(err) = self.storage.save_account(account).await {
                tracing::error!(user_id = %user_id, error = %err, "Wipe rollback failed to restore account");
            }
        }
        if let Err(err) = self.storage.append_transactions(user_id, transactions).await {
            tracing::error!(user_id = %user_id, error = %err, "Wipe rollback failed to restore transactions");
        }
        for snapshot in balances {
            if let Err(err) = self.storage.append_balance_snapshot(user_id, snapshot).await {
                tracing::error!(user_id = %user_id, error = %err, "Wipe rollback failed to restore balance snapshot");
            }
        }
    }

    /// Accounts for a user, newest first.
    pub async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>> {
        let mut accounts = self.storage.list_accounts(user_id).await?;
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(accounts)
    }

    /// Transactions for a user, newest first, with optional pagination.
    pub async fn list_transactions(
        &self,
        user_id: &Id,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = self.storage.get_transactions(user_id).await?;
        sort_newest_first(&mut transactions);
        let transactions: Vec<Transaction> = transactions.into_iter().skip(offset).collect();
        Ok(match limit {
            Some(limit) => transactions.into_iter().take(limit).collect(),
            None => transactions,
        })
    }

    /// Recent activity for one account, newest first. Without an explicit
    /// limit the view shows five rows.
    pub async fn list_account_transactions(
        &self,
        user_id: &Id,
        account_id: &Id,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .storage
            .get_transactions(user_id)
            .await?
            .into_iter()
            .filter(|t| &t.account_id == account_id)
            .collect();
        sort_newest_first(&mut transactions);
        transactions.truncate(limit.unwrap_or(5));
        Ok(transactions)
    }
}

pub(crate) fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn validate_required(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Allow-listed user edits to a transaction.
#[derive(Debug, Default, Clone)]
struct TransactionPatch {
    name: Option<String>,
    merchant_name: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
}

impl TransactionPatch {
    /// Filter an untyped update map through the allow-list; anything else
    /// (amount, date, ids, unknown keys) is dropped without error.
    fn from_updates(updates: &serde_json::Value) -> Self {
        let mut patch = Self::default();
        let Some(map) = updates.as_object() else {
            return patch;
        };
        for field in PATCHABLE_FIELDS {
            let Some(value) = map.get(field).and_then(|v| v.as_str()) else {
                continue;
            };
            let value = value.to_string();
            match field {
                "name" => patch.name = Some(value),
                "merchant_name" => patch.merchant_name = Some(value),
                "category" => patch.category = Some(value),
                "subcategory" => patch.subcategory = Some(value),
                _ => unreachable!("field list and match arms must agree"),
            }
        }
        patch
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.merchant_name.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
    }

    fn apply_to(&self, tx: &mut Transaction) {
        if let Some(name) = &self.name {
            tx.name = name.clone();
        }
        if let Some(merchant_name) = &self.merchant_name {
            tx.merchant_name = Some(merchant_name.clone());
        }
        if let Some(category) = &self.category {
            tx.category = Some(category.clone());
        }
        if let Some(subcategory) = &self.subcategory {
            tx.subcategory = Some(subcategory.clone());
        }
    }
}
