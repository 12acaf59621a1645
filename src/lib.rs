pub mod aggregate;
pub mod cache;
pub mod categories;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod history;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod storage;

pub use error::{LedgerError, Result};
pub use ledger::Ledger;
