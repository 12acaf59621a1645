use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// A ledger owner. The id is issued by the external identity provider and
/// trusted as-is; a row is created on first observed activity and removed
/// only by the full wipe operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Id, at: DateTime<Utc>) -> Self {
        Self { id, created_at: at }
    }
}
