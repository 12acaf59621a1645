use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::models::{Account, BalanceSnapshot, Id, Transaction, User};

use super::{dedup_snapshots, dedup_transactions, Storage};

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   users/
///     {user_id}/
///       user.json
///       transactions.jsonl
///       accounts/
///         {account_id}/
///           account.json
///           balances.jsonl
/// ```
///
/// The JSONL files are append-only. Replace semantics for re-ingested rows
/// come from read-time deduplication (last write wins by transaction id, or
/// by date for balance snapshots), so ingestion never rewrites history.
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn user_dir(&self, user_id: &Id) -> PathBuf {
        self.base_path.join("users").join(user_id.to_string())
    }

    fn user_file(&self, user_id: &Id) -> PathBuf {
        self.user_dir(user_id).join("user.json")
    }

    fn transactions_file(&self, user_id: &Id) -> PathBuf {
        self.user_dir(user_id).join("transactions.jsonl")
    }

    fn accounts_dir(&self, user_id: &Id) -> PathBuf {
        self.user_dir(user_id).join("accounts")
    }

    fn account_dir(&self, user_id: &Id, account_id: &Id) -> PathBuf {
        self.accounts_dir(user_id).join(account_id.to_string())
    }

    fn account_file(&self, user_id: &Id, account_id: &Id) -> PathBuf {
        self.account_dir(user_id, account_id).join("account.json")
    }

    fn balances_file(&self, user_id: &Id, account_id: &Id) -> PathBuf {
        self.account_dir(user_id, account_id).join("balances.jsonl")
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }
        Ok(())
    }

    async fn read_json<T: for<'de> serde::Deserialize<'de>>(
        &self,
        path: &Path,
    ) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read file"),
        }
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dir(path).await?;
        let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
        fs::write(path, content)
            .await
            .context("Failed to write file")?;
        Ok(())
    }

    async fn read_jsonl<T: for<'de> serde::Deserialize<'de>>(&self, path: &Path) -> Result<Vec<T>> {
        let file = match fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to open file"),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut items = Vec::new();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }
            let item: T = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse JSONL line: {}", line))?;
            items.push(item);
        }

        Ok(items)
    }

    async fn append_jsonl<T: serde::Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        self.ensure_dir(path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .context("Failed to open file for append")?;

        for item in items {
            let line = serde_json::to_string(item).context("Failed to serialize item")?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }

        Ok(())
    }

    async fn list_dirs(&self, path: &Path) -> Result<Vec<Id>> {
        let mut ids = Vec::new();

        let mut entries = match fs::read_dir(path).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e).context("Failed to read directory"),
        };

        while let Some(entry) = entries.next_entry().await.context("Failed to read entry")? {
            if let Ok(file_type) = entry.file_type().await {
                if file_type.is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        if Id::is_path_safe(name) {
                            ids.push(Id::from(name));
                        }
                    }
                }
            }
        }

        Ok(ids)
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn get_user(&self, id: &Id) -> Result<Option<User>> {
        self.read_json(&self.user_file(id)).await
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.write_json(&self.user_file(&user.id), user).await
    }

    async fn delete_user(&self, id: &Id) -> Result<bool> {
        match fs::remove_dir_all(self.user_dir(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to remove user directory"),
        }
    }

    async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>> {
        let ids = self.list_dirs(&self.accounts_dir(user_id)).await?;
        let mut accounts = Vec::new();

        for id in ids {
            if let Some(account) = self.get_account(user_id, &id).await? {
                accounts.push(account);
            }
        }

        Ok(accounts)
    }

    async fn get_account(&self, user_id: &Id, account_id: &Id) -> Result<Option<Account>> {
        self.read_json(&self.account_file(user_id, account_id))
            .await
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        self.write_json(&self.account_file(&account.user_id, &account.id), account)
            .await
    }

    async fn delete_accounts(&self, user_id: &Id) -> Result<usize> {
        let count = self.list_dirs(&self.accounts_dir(user_id)).await?.len();
        match fs::remove_dir_all(self.accounts_dir(user_id)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e).context("Failed to remove accounts directory"),
        }
    }

    async fn get_transactions(&self, user_id: &Id) -> Result<Vec<Transaction>> {
        let rows = self.read_jsonl(&self.transactions_file(user_id)).await?;
        Ok(dedup_transactions(rows))
    }

    async fn append_transactions(&self, user_id: &Id, txns: &[Transaction]) -> Result<()> {
        self.append_jsonl(&self.transactions_file(user_id), txns)
            .await
    }

    async fn delete_transactions(&self, user_id: &Id) -> Result<usize> {
        let count = self.get_transactions(user_id).await?.len();
        match fs::remove_file(self.transactions_file(user_id)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e).context("Failed to remove transactions file"),
        }
    }

    async fn get_balance_snapshots(
        &self,
        user_id: &Id,
        account_id: &Id,
    ) -> Result<Vec<BalanceSnapshot>> {
        let rows = self
            .read_jsonl(&self.balances_file(user_id, account_id))
            .await?;
        Ok(dedup_snapshots(rows))
    }

    async fn append_balance_snapshot(
        &self,
        user_id: &Id,
        snapshot: &BalanceSnapshot,
    ) -> Result<()> {
        self.append_jsonl(
            &self.balances_file(user_id, &snapshot.account_id),
            std::slice::from_ref(snapshot),
        )
        .await
    }
}
