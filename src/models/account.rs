use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::Id;

/// An individual financial account mirrored from the aggregator source
/// (checking, savings, credit card, ...).
///
/// `name` is user-editable; `original_name` is the immutable snapshot of what
/// the source called the account when it was first linked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub original_name: String,
    /// Free-form type string from the source (e.g. "depository").
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subkind: Option<String>,
    pub institution_name: String,
    /// Last digits of the account number, when the source provides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Opaque credential used to refresh data from the source. Persisted with
    /// the account but redacted from Debug output; presentation views must
    /// never carry it.
    #[serde(serialize_with = "serialize_credential")]
    pub access_credential: SecretString,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn default_currency() -> String {
    "USD".to_string()
}

fn serialize_credential<S: serde::Serializer>(
    credential: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(credential.expose_secret())
}
