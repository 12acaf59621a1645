//! Typed mirror of the aggregator's wire shape.
//!
//! The source nests balances, category, and location under optional objects;
//! any of them may be missing entirely. Each nested object gets its own
//! all-fields-optional struct, and mapping to internal entities treats an
//! absent object exactly like an object with every field null.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::models::{Account, Id, Transaction};

/// Account payload as delivered by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAccount {
    pub account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub institution_name: String,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub balances: Option<SourceBalances>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceBalances {
    #[serde(default)]
    pub current: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

/// Transaction payload as delivered by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub personal_finance_category: Option<SourceCategory>,
    #[serde(default)]
    pub personal_finance_category_icon_url: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCategory {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub detailed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Internal id for an externally issued identifier. Source ids that are not
/// safe path segments are hashed to a stable UUID instead of rejected, so the
/// same external id always lands on the same row either way.
fn source_id(value: &str) -> Id {
    Id::from_string_checked(value).unwrap_or_else(|_| Id::from_external(value))
}

/// Build an [`Account`] from a source payload.
///
/// The access credential comes from the caller (it belongs to the link, not
/// the payload). `name` and `original_name` both start as the source name;
/// only `name` is user-editable afterwards.
pub fn account_from_source(
    user_id: &Id,
    source: &SourceAccount,
    access_credential: SecretString,
    at: DateTime<Utc>,
) -> Account {
    let balances = source.balances.clone().unwrap_or_default();
    Account {
        id: source_id(&source.account_id),
        user_id: user_id.clone(),
        name: source.name.clone(),
        original_name: source.name.clone(),
        kind: source.kind.clone(),
        subkind: source.subtype.clone(),
        institution_name: source.institution_name.clone(),
        mask: source.mask.clone(),
        current_balance: balances.current,
        currency: balances
            .iso_currency_code
            .unwrap_or_else(|| "USD".to_string()),
        access_credential,
        created_at: at,
        updated_at: at,
    }
}

/// Build a [`Transaction`] from a source payload.
pub fn transaction_from_source(
    user_id: &Id,
    source: &SourceTransaction,
    at: DateTime<Utc>,
) -> Transaction {
    let category = source.personal_finance_category.clone().unwrap_or_default();
    let location = source.location.clone().unwrap_or_default();
    Transaction {
        id: source_id(&source.transaction_id),
        account_id: source_id(&source.account_id),
        user_id: user_id.clone(),
        amount: source.amount,
        currency: source
            .iso_currency_code
            .clone()
            .unwrap_or_else(|| "USD".to_string()),
        name: source.name.clone(),
        original_name: source.name.clone(),
        merchant_name: source.merchant_name.clone(),
        date: source.date,
        category: category.primary,
        subcategory: category.detailed,
        category_icon_url: source.personal_finance_category_icon_url.clone(),
        pending: source.pending,
        location_city: location.city,
        location_region: location.region,
        location_country: location.country,
        created_at: at,
        updated_at: at,
    }
}
