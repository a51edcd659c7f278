use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Meeting, NewMeeting},
    goe_api::meeting_objects::MeetingQueryFilter,
    traits::GroupOrderError,
};

/// Inserts a new meeting in `Gathering` state with the leader already counted. The caller is
/// responsible for inserting the leader's purchase in the same transaction.
pub async fn insert_meeting(meeting: NewMeeting, conn: &mut SqliteConnection) -> Result<Meeting, GroupOrderError> {
    let meeting: Meeting = sqlx::query_as(
        r#"
            INSERT INTO meetings (
                store_id,
                leader_id,
                purchase_type,
                min_headcount,
                max_headcount,
                current_headcount,
                is_early_payment_available,
                payment_available_at,
                delivery_fee,
                delivery_postal, delivery_street, delivery_detail,
                met_postal, met_street, met_detail
            ) VALUES ($1, $2, $3, $4, $5, 1, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *;
        "#,
    )
    .bind(meeting.store_id)
    .bind(meeting.leader_id)
    .bind(meeting.purchase_type)
    .bind(meeting.min_headcount)
    .bind(meeting.max_headcount)
    .bind(meeting.is_early_payment_available)
    .bind(meeting.payment_available_at)
    .bind(meeting.delivery_fee)
    .bind(meeting.delivery_address.postal)
    .bind(meeting.delivery_address.street)
    .bind(meeting.delivery_address.detail)
    .bind(meeting.met_address.postal)
    .bind(meeting.met_address.street)
    .bind(meeting.met_address.detail)
    .fetch_one(conn)
    .await?;
    debug!("📅️ Meeting #{} created for store {} by leader {}", meeting.id, meeting.store_id, meeting.leader_id);
    Ok(meeting)
}

pub async fn fetch_meeting_by_id(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Meeting>, sqlx::Error> {
    let meeting =
        sqlx::query_as("SELECT * FROM meetings WHERE id = $1").bind(meeting_id).fetch_optional(conn).await?;
    Ok(meeting)
}

/// The admission guard: a conditional check-and-increment verified by the affected-row count.
/// This must be the first statement of the join transaction so that the transaction takes the
/// write lock immediately and racing joins serialise on it.
///
/// Returns `false` when the guard did not fire, i.e. the meeting is missing, closed, or full.
pub async fn try_increment_headcount(meeting_id: i64, conn: &mut SqliteConnection) -> Result<bool, GroupOrderError> {
    let result = sqlx::query(
        r#"UPDATE meetings SET
           current_headcount = current_headcount + 1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Gathering' AND current_headcount < max_headcount"#,
    )
    .bind(meeting_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Counterpart of [`try_increment_headcount`] for leave. Same guard discipline.
pub async fn try_decrement_headcount(meeting_id: i64, conn: &mut SqliteConnection) -> Result<bool, GroupOrderError> {
    let result = sqlx::query(
        r#"UPDATE meetings SET
           current_headcount = current_headcount - 1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Gathering' AND current_headcount > 0"#,
    )
    .bind(meeting_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// The status flip that opens a settlement: `Gathering` → `Locked`, guarded by the minimum
/// headcount. Exactly one of the racing lock attempts (deadline sweep vs early lock) can win
/// this update; the loser observes zero affected rows and re-reads the status.
pub async fn try_lock_meeting(meeting_id: i64, conn: &mut SqliteConnection) -> Result<Option<Meeting>, GroupOrderError> {
    let meeting: Option<Meeting> = sqlx::query_as(
        r#"UPDATE meetings SET
           status = 'Locked',
           locked_at = CURRENT_TIMESTAMP,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Gathering' AND current_headcount >= min_headcount
           RETURNING *"#,
    )
    .bind(meeting_id)
    .fetch_optional(conn)
    .await?;
    Ok(meeting)
}

/// `Gathering` or `Locked` → `Cancelled`. Terminal states stay put.
pub async fn try_cancel_meeting(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Meeting>, GroupOrderError> {
    let meeting: Option<Meeting> = sqlx::query_as(
        r#"UPDATE meetings SET
           status = 'Cancelled',
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status IN ('Gathering', 'Locked')
           RETURNING *"#,
    )
    .bind(meeting_id)
    .fetch_optional(conn)
    .await?;
    Ok(meeting)
}

/// `Locked` → `Delivered`.
pub async fn try_mark_delivered(
    meeting_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Meeting>, GroupOrderError> {
    let meeting: Option<Meeting> = sqlx::query_as(
        r#"UPDATE meetings SET
           status = 'Delivered',
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Locked'
           RETURNING *"#,
    )
    .bind(meeting_id)
    .fetch_optional(conn)
    .await?;
    Ok(meeting)
}

/// Gathering meetings whose payment deadline has passed, for the sweep to lock or cancel.
pub async fn fetch_due_meetings(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Meeting>, GroupOrderError> {
    let meetings: Vec<Meeting> = sqlx::query_as(
        "SELECT * FROM meetings WHERE status = 'Gathering' AND payment_available_at <= $1 ORDER BY \
         payment_available_at ASC",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(meetings)
}

/// Fetches meetings according to criteria specified in the `MeetingQueryFilter`.
///
/// Resulting meetings are ordered by payment deadline in ascending order.
pub async fn search_meetings(
    query: MeetingQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Meeting>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM meetings
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(store_id) = query.store_id {
        where_clause.push("store_id = ");
        where_clause.push_bind_unseparated(store_id);
    }
    if let Some(leader_id) = query.leader_id {
        where_clause.push("leader_id = ");
        where_clause.push_bind_unseparated(leader_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(due_before) = query.due_before {
        where_clause.push("payment_available_at <= ");
        where_clause.push_bind_unseparated(due_before);
    }
    if let Some(due_after) = query.due_after {
        where_clause.push("payment_available_at >= ");
        where_clause.push_bind_unseparated(due_after);
    }
    builder.push(" ORDER BY payment_available_at ASC");

    trace!("📅️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Meeting>();
    let meetings = query.fetch_all(conn).await?;
    trace!("Result of search_meetings: {:?}", meetings.len());
    Ok(meetings)
}
