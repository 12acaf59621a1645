//! End-to-end flow over file-backed storage: ingest, query, edit, wipe.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tempfile::TempDir;

use tallybook::aggregate::Aggregator;
use tallybook::clock::FixedClock;
use tallybook::history::BalanceHistory;
use tallybook::ingest::{SourceAccount, SourceTransaction};
use tallybook::models::Id;
use tallybook::storage::JsonFileStorage;
use tallybook::{Ledger, Result};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn file_ledger(dir: &TempDir) -> Ledger {
    Ledger::new(
        Arc::new(JsonFileStorage::new(dir.path())),
        Arc::new(FixedClock::on_date(d("2024-03-15"))),
    )
}

fn checking_account() -> SourceAccount {
    serde_json::from_value(serde_json::json!({
        "account_id": "acct-1",
        "name": "Plaid Checking",
        "type": "depository",
        "subtype": "checking",
        "institution_name": "First Platypus Bank",
        "mask": "0000",
        "balances": { "current": "1100.50", "iso_currency_code": "USD" }
    }))
    .unwrap()
}

fn tx(id: &str, amount: &str, date: &str, category: &str) -> SourceTransaction {
    serde_json::from_value(serde_json::json!({
        "transaction_id": id,
        "account_id": "acct-1",
        "amount": amount,
        "name": format!("purchase {id}"),
        "date": date,
        "personal_finance_category": { "primary": category }
    }))
    .unwrap()
}

#[tokio::test]
async fn ingest_query_edit_and_reload_from_disk() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let user = Id::from_string("user-1");

    {
        let ledger = file_ledger(&dir);
        ledger
            .upsert_account(
                &user,
                &checking_account(),
                SecretString::new("access-sandbox-1".to_string().into()),
            )
            .await?;

        let batch = vec![
            tx("tx-1", "12.50", "2024-03-01", "FOOD_AND_DRINK"),
            tx("tx-2", "45.00", "2024-03-05", "GROCERIES"),
            tx("tx-3", "-2500.00", "2024-03-10", "PAYROLL"),
        ];
        let result = ledger.upsert_transactions_batch(&user, &batch).await?;
        assert_eq!(result.succeeded_count(), 3);
        assert_eq!(result.failed_count(), 0);

        // Resending the batch is a no-op row-wise.
        ledger.upsert_transactions_batch(&user, &batch).await?;

        ledger
            .update_transaction_fields(
                &user,
                &Id::from_string("tx-1"),
                &serde_json::json!({ "name": "Coffee", "amount": 999 }),
            )
            .await?;
    }

    // A fresh ledger over the same directory sees everything.
    let ledger = file_ledger(&dir);
    let accounts = ledger.list_accounts(&user).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].current_balance, Some(Decimal::new(1100_50, 2)));

    let rows = ledger.list_transactions(&user, None, 0).await?;
    assert_eq!(rows.len(), 3);
    let edited = rows.iter().find(|t| t.id.as_str() == "tx-1").unwrap();
    assert_eq!(edited.name, "Coffee");
    assert_eq!(edited.amount, Decimal::new(12_50, 2));

    let aggregator = Aggregator::new(&ledger);
    let stats = aggregator.user_stats(&user).await?;
    assert_eq!(stats.transaction_count, 3);
    assert_eq!(stats.total_spent, Decimal::new(57_50, 2));
    assert_eq!(stats.total_income, Decimal::new(2500_00, 2));

    let monthly = aggregator.monthly_summary(&user, 12).await?;
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].month, "2024-03");
    assert_eq!(monthly[0].transaction_count, 2);

    let range = aggregator
        .range_summary(&user, d("2024-03-01"), 5, true, None)
        .await?;
    let ids: Vec<&str> = range.transactions.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["tx-2", "tx-1"]);
    let categories = range.categories.unwrap();
    assert_eq!(categories[0].category, "groceries");

    Ok(())
}

#[tokio::test]
async fn balance_history_survives_reload() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let user = Id::from_string("user-1");
    let acct = Id::from_string("acct-1");

    {
        let ledger = file_ledger(&dir);
        let history = BalanceHistory::new(&ledger);
        history
            .record_snapshot(&user, &acct, d("2024-01-31"), Decimal::new(1000, 0))
            .await?;
        history
            .record_snapshot(&user, &acct, d("2024-02-29"), Decimal::new(1200, 0))
            .await?;
        // Same-date correction overwrites.
        history
            .record_snapshot(&user, &acct, d("2024-02-29"), Decimal::new(1250, 0))
            .await?;
    }

    let ledger = file_ledger(&dir);
    let history = BalanceHistory::new(&ledger);
    let points = history.history(&user, &acct).await?;
    assert_eq!(points.len(), 2);
    assert_eq!(points[1].amount, Decimal::new(1250, 0));
    assert_eq!(points[1].period_change, Some(Decimal::new(25, 0)));

    assert_eq!(
        history.month_over_month(&user, &acct, 2024, 2).await?,
        Some(Decimal::new(25, 0))
    );
    Ok(())
}

#[tokio::test]
async fn wipe_clears_the_user_directory() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let user = Id::from_string("user-1");

    let ledger = file_ledger(&dir);
    ledger
        .upsert_account(
            &user,
            &checking_account(),
            SecretString::new("access-sandbox-1".to_string().into()),
        )
        .await?;
    ledger
        .upsert_transaction(&user, &tx("tx-1", "12.50", "2024-03-01", "FOOD_AND_DRINK"))
        .await?;

    let summary = ledger.wipe_user(&user).await?;
    assert_eq!(summary.transactions_deleted, 1);
    assert_eq!(summary.accounts_deleted, 1);
    assert!(summary.user_deleted);

    assert!(ledger.list_accounts(&user).await?.is_empty());
    assert!(ledger.list_transactions(&user, None, 0).await?.is_empty());
    assert!(!dir.path().join("users").join("user-1").exists());
    Ok(())
}
