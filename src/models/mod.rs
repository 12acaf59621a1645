mod account;
mod balance;
mod id;
mod transaction;
mod user;

pub use account::Account;
pub use balance::BalanceSnapshot;
pub use id::{Id, IdError};
pub use transaction::{Direction, Transaction};
pub use user::User;
