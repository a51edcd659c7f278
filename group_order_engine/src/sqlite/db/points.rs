use gos_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PointEntry, PointEntryType},
    sqlite::db::accounts,
    traits::AccountApiError,
};

/// Credits the account balance and appends the matching ledger entry. Used for `Earn` and
/// `Refund` entries; both always succeed for a live account.
pub async fn credit(
    account_id: i64,
    meeting_id: Option<i64>,
    entry_type: PointEntryType,
    amount: Money,
    memo: &str,
    conn: &mut SqliteConnection,
) -> Result<PointEntry, AccountApiError> {
    if amount.value() <= 0 {
        return Err(AccountApiError::NonPositiveAmount(amount));
    }
    let new_balance: Option<(Money,)> = sqlx::query_as(
        r#"UPDATE accounts SET
           point_balance = point_balance + $1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND deleted_at IS NULL
           RETURNING point_balance"#,
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;
    let (balance_after,) = new_balance.ok_or(AccountApiError::AccountNotFound(account_id))?;
    let entry = insert_entry(account_id, meeting_id, entry_type, amount, balance_after, memo, conn).await?;
    trace!("🪙️ {entry_type} of {amount} applied to account #{account_id}. Balance is now {balance_after}");
    Ok(entry)
}

/// Debits the account balance, guarded by `point_balance >= amount` and verified by the
/// affected-row count, so the balance can never go negative even under concurrent spends.
pub async fn debit(
    account_id: i64,
    meeting_id: Option<i64>,
    amount: Money,
    memo: &str,
    conn: &mut SqliteConnection,
) -> Result<PointEntry, AccountApiError> {
    if amount.value() <= 0 {
        return Err(AccountApiError::NonPositiveAmount(amount));
    }
    let new_balance: Option<(Money,)> = sqlx::query_as(
        r#"UPDATE accounts SET
           point_balance = point_balance - $1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND deleted_at IS NULL AND point_balance >= $1
           RETURNING point_balance"#,
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;
    let balance_after = match new_balance {
        Some((balance,)) => balance,
        None => {
            // Distinguish a missing account from an insufficient balance.
            let account = accounts::fetch_account_by_id(account_id, conn)
                .await?
                .ok_or(AccountApiError::AccountNotFound(account_id))?;
            return Err(AccountApiError::InsufficientBalance {
                account_id,
                balance: account.point_balance,
                required: amount,
            });
        },
    };
    let entry = insert_entry(account_id, meeting_id, PointEntryType::Spend, amount, balance_after, memo, conn).await?;
    trace!("🪙️ Spend of {amount} applied to account #{account_id}. Balance is now {balance_after}");
    Ok(entry)
}

async fn insert_entry(
    account_id: i64,
    meeting_id: Option<i64>,
    entry_type: PointEntryType,
    amount: Money,
    balance_after: Money,
    memo: &str,
    conn: &mut SqliteConnection,
) -> Result<PointEntry, AccountApiError> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO point_entries (account_id, meeting_id, entry_type, amount, balance_after, memo)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(account_id)
    .bind(meeting_id)
    .bind(entry_type)
    .bind(amount)
    .bind(balance_after)
    .bind(memo)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn entries_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PointEntry>, AccountApiError> {
    let entries = sqlx::query_as("SELECT * FROM point_entries WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// The `Spend` entries a settlement recorded against the meeting. Cancellation compensates each
/// of these with a matching refund.
pub async fn spends_for_meeting(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PointEntry>, AccountApiError> {
    let entries =
        sqlx::query_as("SELECT * FROM point_entries WHERE meeting_id = $1 AND entry_type = 'Spend' ORDER BY id ASC")
            .bind(meeting_id)
            .fetch_all(conn)
            .await?;
    Ok(entries)
}
