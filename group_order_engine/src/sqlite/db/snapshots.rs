use gos_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LineItem, Purchase, PurchasePayment, TeamPurchasePayment},
    traits::GroupOrderError,
};

/// Writes the per-line settlement record for one cart line, copying the values captured at
/// add time. Only ever called inside the settlement transaction.
pub async fn insert_purchase_payment(
    meeting_id: i64,
    purchase: &Purchase,
    line: &LineItem,
    conn: &mut SqliteConnection,
) -> Result<PurchasePayment, GroupOrderError> {
    let snapshot = sqlx::query_as(
        r#"
            INSERT INTO purchase_payments (
                meeting_id, purchase_id, account_id, menu_name, image, menu_description, unit_price, quantity
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(meeting_id)
    .bind(purchase.id)
    .bind(purchase.account_id)
    .bind(&line.menu_name)
    .bind(&line.image)
    .bind(&line.menu_description)
    .bind(line.unit_price)
    .bind(line.quantity)
    .fetch_one(conn)
    .await?;
    Ok(snapshot)
}

/// Writes the meeting-level settlement record. The UNIQUE constraint on `meeting_id` backs up
/// the idempotency guard: a duplicate settlement attempt cannot slip a second row in.
pub async fn insert_team_payment(
    meeting_id: i64,
    headcount: i64,
    items_total: Money,
    delivery_fee: Money,
    conn: &mut SqliteConnection,
) -> Result<TeamPurchasePayment, GroupOrderError> {
    let snapshot = sqlx::query_as(
        r#"
            INSERT INTO team_purchase_payments (meeting_id, headcount, items_total, delivery_fee, total_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(meeting_id)
    .bind(headcount)
    .bind(items_total)
    .bind(delivery_fee)
    .bind(items_total + delivery_fee)
    .fetch_one(conn)
    .await?;
    Ok(snapshot)
}

pub async fn team_payment_for_meeting(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TeamPurchasePayment>, sqlx::Error> {
    let snapshot = sqlx::query_as("SELECT * FROM team_purchase_payments WHERE meeting_id = $1")
        .bind(meeting_id)
        .fetch_optional(conn)
        .await?;
    Ok(snapshot)
}

pub async fn purchase_payments_for_meeting(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PurchasePayment>, sqlx::Error> {
    let snapshots = sqlx::query_as("SELECT * FROM purchase_payments WHERE meeting_id = $1 ORDER BY id ASC")
        .bind(meeting_id)
        .fetch_all(conn)
        .await?;
    Ok(snapshots)
}

pub async fn purchase_payments_for_account(
    meeting_id: i64,
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PurchasePayment>, sqlx::Error> {
    let snapshots =
        sqlx::query_as("SELECT * FROM purchase_payments WHERE meeting_id = $1 AND account_id = $2 ORDER BY id ASC")
            .bind(meeting_id)
            .bind(account_id)
            .fetch_all(conn)
            .await?;
    Ok(snapshots)
}
