use gos_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LineItem, Purchase, PurchaseStatus},
    traits::{CapturedItem, GroupOrderError},
};

pub async fn insert_purchase(
    meeting_id: i64,
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Purchase, GroupOrderError> {
    let purchase = sqlx::query_as(
        r#"
            INSERT INTO purchases (meeting_id, account_id)
            VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(meeting_id)
    .bind(account_id)
    .fetch_one(conn)
    .await?;
    Ok(purchase)
}

pub async fn fetch_purchase(
    meeting_id: i64,
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Purchase>, sqlx::Error> {
    let purchase = sqlx::query_as("SELECT * FROM purchases WHERE meeting_id = $1 AND account_id = $2")
        .bind(meeting_id)
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    Ok(purchase)
}

pub async fn purchases_for_meeting(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Purchase>, sqlx::Error> {
    let purchases = sqlx::query_as("SELECT * FROM purchases WHERE meeting_id = $1 ORDER BY id ASC")
        .bind(meeting_id)
        .fetch_all(conn)
        .await?;
    Ok(purchases)
}

/// Deletes the purchase and its cart lines. Used by leave; settlement never deletes.
pub async fn delete_purchase(purchase_id: i64, conn: &mut SqliteConnection) -> Result<(), GroupOrderError> {
    sqlx::query("DELETE FROM line_items WHERE purchase_id = $1").bind(purchase_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM purchases WHERE id = $1").bind(purchase_id).execute(conn).await?;
    Ok(())
}

/// Flips every non-cancelled purchase of the meeting to the given status. Settlement moves
/// `Open` carts to `Locked`; cancellation moves both `Open` and `Locked` carts to `Cancelled`.
/// Returns the number of purchases flipped.
pub async fn flip_active_purchases(
    meeting_id: i64,
    status: PurchaseStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, GroupOrderError> {
    let result = sqlx::query(
        "UPDATE purchases SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE meeting_id = $2 AND status IN \
         ('Open', 'Locked')",
    )
    .bind(status)
    .bind(meeting_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_line_item(
    purchase_id: i64,
    item: CapturedItem,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<LineItem, GroupOrderError> {
    let line = sqlx::query_as(
        r#"
            INSERT INTO line_items (purchase_id, menu_id, menu_name, image, menu_description, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(purchase_id)
    .bind(item.menu_id)
    .bind(item.menu_name)
    .bind(item.image)
    .bind(item.menu_description)
    .bind(item.unit_price)
    .bind(quantity)
    .fetch_one(conn)
    .await?;
    Ok(line)
}

/// Updates the quantity of a cart line, verifying that the line belongs to the participant's
/// purchase on this meeting.
pub async fn update_line_item_quantity(
    meeting_id: i64,
    account_id: i64,
    line_item_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LineItem>, GroupOrderError> {
    let line: Option<LineItem> = sqlx::query_as(
        r#"UPDATE line_items SET quantity = $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND purchase_id IN (
               SELECT id FROM purchases WHERE meeting_id = $3 AND account_id = $4
           )
           RETURNING *"#,
    )
    .bind(quantity)
    .bind(line_item_id)
    .bind(meeting_id)
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(line)
}

/// Removes a cart line with the same ownership check as [`update_line_item_quantity`].
/// Returns `false` if no such line was found.
pub async fn delete_line_item(
    meeting_id: i64,
    account_id: i64,
    line_item_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, GroupOrderError> {
    let result = sqlx::query(
        r#"DELETE FROM line_items
           WHERE id = $1 AND purchase_id IN (
               SELECT id FROM purchases WHERE meeting_id = $2 AND account_id = $3
           )"#,
    )
    .bind(line_item_id)
    .bind(meeting_id)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn line_items_for_purchase(
    purchase_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LineItem>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM line_items WHERE purchase_id = $1 ORDER BY id ASC")
        .bind(purchase_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Sum of `quantity × unit_price` over one participant's cart.
pub async fn participant_subtotal(
    meeting_id: i64,
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Money, GroupOrderError> {
    let (subtotal,): (Money,) = sqlx::query_as(
        r#"SELECT COALESCE(SUM(unit_price * quantity), 0) FROM line_items
           JOIN purchases ON purchases.id = line_items.purchase_id
           WHERE purchases.meeting_id = $1 AND purchases.account_id = $2"#,
    )
    .bind(meeting_id)
    .bind(account_id)
    .fetch_one(conn)
    .await?;
    trace!("🛒️ Subtotal for account #{account_id} on meeting #{meeting_id}: {subtotal}");
    Ok(subtotal)
}

/// Sum of all participant subtotals on the meeting.
pub async fn meeting_items_total(meeting_id: i64, conn: &mut SqliteConnection) -> Result<Money, GroupOrderError> {
    let (total,): (Money,) = sqlx::query_as(
        r#"SELECT COALESCE(SUM(unit_price * quantity), 0) FROM line_items
           JOIN purchases ON purchases.id = line_items.purchase_id
           WHERE purchases.meeting_id = $1"#,
    )
    .bind(meeting_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}
