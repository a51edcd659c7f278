use gos_common::Money;
use thiserror::Error;

use crate::db_types::{Account, NewAccount, PointEntry};

/// Point-ledger and account behaviour for engine backends.
///
/// Every balance mutation appends a [`PointEntry`] carrying the running balance, in the same
/// transaction that updates the stored balance. The balance can never go negative: `Spend`
/// entries are guarded by a conditional update verified by affected-row count.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn create_account(&self, account: NewAccount) -> Result<Account, AccountApiError>;

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError>;

    /// Credits the balance. `amount` must be positive.
    async fn record_earn(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError>;

    /// Debits the balance. Fails with [`AccountApiError::InsufficientBalance`] when the balance
    /// is smaller than `amount`.
    async fn record_spend(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError>;

    /// Credits the balance back. Always succeeds for an existing account; invoked by meeting
    /// cancellation for every participant whose points were held.
    async fn record_refund(&self, account_id: i64, amount: Money, memo: &str)
        -> Result<PointEntry, AccountApiError>;

    /// The account's ledger, oldest entry first.
    async fn fetch_point_history(&self, account_id: i64) -> Result<Vec<PointEntry>, AccountApiError>;

    /// Returns the reasons the account cannot withdraw right now. Empty means withdrawal is
    /// permitted. An account is blocked while its point balance is nonzero, while any meeting it
    /// participates in is still in progress, and (for entrepreneurs) while any meeting against
    /// their store is still in progress.
    async fn withdrawal_blockers(&self, account_id: i64) -> Result<Vec<WithdrawalBlockReason>, AccountApiError>;

    /// Soft-deletes the account, re-checking the blockers inside the same transaction. History
    /// is never erased; the account is only timestamped as deleted.
    async fn withdraw_account(&self, account_id: i64) -> Result<Account, AccountApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalBlockReason {
    #[error("point balance is not zero ({0})")]
    NonzeroBalance(Money),
    #[error("meeting {0} the account participates in is still in progress")]
    MeetingInProgress(i64),
    #[error("meeting {0} against the account's store is still in progress")]
    StoreOrderInProgress(i64),
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested account {0} does not exist")]
    AccountNotFound(i64),
    #[error("The account {0} has already been withdrawn")]
    AccountWithdrawn(i64),
    #[error("Ledger amounts must be positive, got {0}")]
    NonPositiveAmount(Money),
    #[error("Account {account_id} has insufficient points: balance {balance}, required {required}")]
    InsufficientBalance { account_id: i64, balance: Money, required: Money },
    #[error("Withdrawal blocked: {}", crate::traits::account_management::format_reasons(.0))]
    WithdrawalBlocked(Vec<WithdrawalBlockReason>),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

pub(crate) fn format_reasons(reasons: &[WithdrawalBlockReason]) -> String {
    reasons.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("; ")
}
