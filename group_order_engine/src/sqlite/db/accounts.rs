use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, NewAccount},
    traits::{AccountApiError, WithdrawalBlockReason},
};

pub async fn insert_account(account: NewAccount, conn: &mut SqliteConnection) -> Result<Account, AccountApiError> {
    let account = sqlx::query_as(
        r#"
            INSERT INTO accounts (email, nickname, role, store_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(account.email)
    .bind(account.nickname)
    .bind(account.role)
    .bind(account.store_id)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

pub async fn fetch_account_by_id(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, sqlx::Error> {
    let account =
        sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Collects every reason the account may not withdraw right now: a nonzero point balance, any
/// meeting they participate in that is still in progress, and, for an entrepreneur, any meeting
/// against their store that is still in progress.
pub async fn withdrawal_blockers(
    account: &Account,
    conn: &mut SqliteConnection,
) -> Result<Vec<WithdrawalBlockReason>, AccountApiError> {
    let mut reasons = Vec::new();
    if !account.point_balance.is_zero() {
        reasons.push(WithdrawalBlockReason::NonzeroBalance(account.point_balance));
    }
    let in_progress: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT meetings.id FROM meetings
        JOIN purchases ON purchases.meeting_id = meetings.id
        WHERE purchases.account_id = $1 AND meetings.status IN ('Gathering', 'Locked')
        ORDER BY meetings.id"#,
    )
    .bind(account.id)
    .fetch_all(&mut *conn)
    .await?;
    reasons.extend(in_progress.into_iter().map(|(id,)| WithdrawalBlockReason::MeetingInProgress(id)));
    if let Some(store_id) = account.store_id {
        let store_orders: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM meetings WHERE store_id = $1 AND status IN ('Gathering', 'Locked') ORDER BY id",
        )
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;
        reasons.extend(store_orders.into_iter().map(|(id,)| WithdrawalBlockReason::StoreOrderInProgress(id)));
    }
    trace!("🧑️ Account #{} has {} withdrawal blockers", account.id, reasons.len());
    Ok(reasons)
}

/// Soft delete. The caller must have verified the blockers inside the same transaction.
pub async fn mark_withdrawn(account_id: i64, conn: &mut SqliteConnection) -> Result<Account, AccountApiError> {
    let account: Option<Account> = sqlx::query_as(
        "UPDATE accounts SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = $1 \
         RETURNING *",
    )
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    account.ok_or(AccountApiError::AccountNotFound(account_id))
}
