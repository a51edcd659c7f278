//! Unified API for accounts and the point ledger.

use std::fmt::Debug;

use gos_common::Money;
use log::*;

use crate::{
    db_types::{Account, NewAccount, PointEntry},
    traits::{AccountApiError, AccountManagement, WithdrawalBlockReason},
};

/// The `AccountApi` provides a unified API for accounts: balances, the point ledger, and the
/// withdrawal gate.
pub struct AccountApi<B> {
    db: B,
}

impl<B> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi")
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn register(&self, account: NewAccount) -> Result<Account, AccountApiError> {
        let account = self.db.create_account(account).await?;
        debug!("🧑️📒️ Account #{} ({}) created", account.id, account.role);
        Ok(account)
    }

    /// Fetches the account for the given id. If no account exists, `None` is returned.
    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account(account_id).await
    }

    pub async fn balance(&self, account_id: i64) -> Result<Money, AccountApiError> {
        let account =
            self.db.fetch_account(account_id).await?.ok_or(AccountApiError::AccountNotFound(account_id))?;
        Ok(account.point_balance)
    }

    /// The account's full ledger, oldest entry first. Each entry carries the running balance, so
    /// the last entry's `balance_after` always equals the stored balance.
    pub async fn history(&self, account_id: i64) -> Result<Vec<PointEntry>, AccountApiError> {
        self.db.fetch_point_history(account_id).await
    }

    pub async fn earn(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError> {
        if amount <= Money::from(0) {
            return Err(AccountApiError::NonPositiveAmount(amount));
        }
        self.db.record_earn(account_id, amount, memo).await
    }

    pub async fn spend(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError> {
        if amount <= Money::from(0) {
            return Err(AccountApiError::NonPositiveAmount(amount));
        }
        self.db.record_spend(account_id, amount, memo).await
    }

    pub async fn refund(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError> {
        if amount <= Money::from(0) {
            return Err(AccountApiError::NonPositiveAmount(amount));
        }
        self.db.record_refund(account_id, amount, memo).await
    }

    /// Returns what currently blocks the account from withdrawing. An empty list means
    /// `withdraw` would succeed right now (barring a race; the gate is re-checked inside the
    /// withdrawal transaction).
    pub async fn withdrawal_blockers(
        &self,
        account_id: i64,
    ) -> Result<Vec<WithdrawalBlockReason>, AccountApiError> {
        self.db.withdrawal_blockers(account_id).await
    }

    pub async fn can_withdraw(&self, account_id: i64) -> Result<bool, AccountApiError> {
        Ok(self.db.withdrawal_blockers(account_id).await?.is_empty())
    }

    /// Soft-deletes the account. Fails with [`AccountApiError::WithdrawalBlocked`] while the
    /// balance is nonzero or any of the account's meetings are in progress.
    pub async fn withdraw(&self, account_id: i64) -> Result<Account, AccountApiError> {
        let account = self.db.withdraw_account(account_id).await?;
        info!("🧑️📒️ Account #{account_id} withdrawn");
        Ok(account)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
