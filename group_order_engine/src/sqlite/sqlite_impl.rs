//! `SqliteDatabase` is a concrete implementation of a group-order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Every multi-step aggregate mutation runs inside a single
//! transaction, and the admission and status-transition guards are conditional updates verified
//! by affected-row count, so concurrent requests against the same meeting serialise on the
//! database rather than on in-process locks.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use gos_common::Money;
use log::*;
use sqlx::SqlitePool;

use super::db::{accounts, meetings, new_pool, points, purchases, snapshots};
use crate::{
    db_types::{
        Account,
        LineItem,
        Meeting,
        MeetingStatus,
        NewAccount,
        NewMeeting,
        PointEntry,
        PointEntryType,
        Purchase,
        PurchasePayment,
        PurchaseStatus,
        TeamPurchasePayment,
    },
    goe_api::meeting_objects::MeetingQueryFilter,
    traits::{
        AccountApiError,
        AccountManagement,
        CapturedItem,
        GroupOrderDatabase,
        GroupOrderError,
        SettlementOutcome,
        TeamTotal,
        WithdrawalBlockReason,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool to the database at `url`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, GroupOrderError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Writes every settlement artefact for a meeting that has just been (or was found already)
    /// locked: per-line snapshots, the team snapshot, purchase status flips, and the point
    /// deductions. Runs inside the caller's transaction.
    async fn write_settlement(
        &self,
        meeting: Meeting,
        tx: &mut sqlx::SqliteConnection,
    ) -> Result<SettlementOutcome, GroupOrderError> {
        let meeting_id = meeting.id;
        let headcount = meeting.current_headcount;
        // The delivery fee is split evenly; the leader absorbs the integer remainder.
        let fee_share = meeting.delivery_fee / headcount;
        let fee_remainder = meeting.delivery_fee - fee_share * headcount;
        let memo = format!("Settlement of meeting #{meeting_id}");

        let all_purchases = purchases::purchases_for_meeting(meeting_id, &mut *tx).await?;
        let mut purchase_snapshots = Vec::new();
        let mut spends = Vec::new();
        let mut items_total = Money::default();
        for purchase in &all_purchases {
            let lines = purchases::line_items_for_purchase(purchase.id, &mut *tx).await?;
            let mut subtotal = Money::default();
            for line in &lines {
                subtotal += line.line_total();
                let snapshot = snapshots::insert_purchase_payment(meeting_id, purchase, line, &mut *tx).await?;
                purchase_snapshots.push(snapshot);
            }
            items_total += subtotal;
            let mut share = subtotal + fee_share;
            if purchase.account_id == meeting.leader_id {
                share += fee_remainder;
            }
            if share.value() > 0 {
                let entry = points::debit(purchase.account_id, Some(meeting_id), share, &memo, &mut *tx)
                    .await
                    .map_err(|e| match e {
                        AccountApiError::InsufficientBalance { account_id, balance, required } => {
                            GroupOrderError::InsufficientBalance { account_id, balance, required }
                        },
                        e => GroupOrderError::AccountError(e),
                    })?;
                spends.push(entry);
            }
        }
        let team_snapshot =
            snapshots::insert_team_payment(meeting_id, headcount, items_total, meeting.delivery_fee, &mut *tx)
                .await?;
        purchases::flip_active_purchases(meeting_id, PurchaseStatus::Locked, &mut *tx).await?;
        debug!(
            "🔒️ Meeting #{meeting_id} settled: {} snapshot lines, team total {}",
            purchase_snapshots.len(),
            team_snapshot.total_amount
        );
        Ok(SettlementOutcome { meeting, purchase_snapshots, team_snapshot, spends, already_settled: false })
    }
}

impl GroupOrderDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let leader_id = meeting.leader_id;
        let meeting = meetings::insert_meeting(meeting, &mut tx).await?;
        // The leader is a participant from the start.
        purchases::insert_purchase(meeting.id, leader_id, &mut tx).await?;
        tx.commit().await?;
        Ok(meeting)
    }

    async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut conn).await?;
        Ok(meeting)
    }

    async fn search_meetings(&self, filter: MeetingQueryFilter) -> Result<Vec<Meeting>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let meetings = meetings::search_meetings(filter, &mut conn).await?;
        Ok(meetings)
    }

    async fn join_meeting(&self, meeting_id: i64, account_id: i64) -> Result<Purchase, GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        // The guard runs first so the transaction is a writer from its first statement; two
        // racing joins serialise here and only one can take the last slot.
        if !meetings::try_increment_headcount(meeting_id, &mut tx).await? {
            let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
                .await?
                .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
            return Err(match meeting.status {
                MeetingStatus::Gathering => GroupOrderError::CapacityExceeded(meeting_id, meeting.max_headcount),
                status => GroupOrderError::MeetingClosed(meeting_id, status),
            });
        }
        if purchases::fetch_purchase(meeting_id, account_id, &mut tx).await?.is_some() {
            // Dropping the transaction rolls the increment back.
            return Err(GroupOrderError::AlreadyJoined(meeting_id, account_id));
        }
        let purchase = purchases::insert_purchase(meeting_id, account_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🙋️ Account #{account_id} joined meeting #{meeting_id}");
        Ok(purchase)
    }

    async fn leave_meeting(&self, meeting_id: i64, account_id: i64) -> Result<(), GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        if !meetings::try_decrement_headcount(meeting_id, &mut tx).await? {
            let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
                .await?
                .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
            return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status));
        }
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        if meeting.leader_id == account_id {
            return Err(GroupOrderError::LeaderCannotLeave(meeting_id));
        }
        let purchase = purchases::fetch_purchase(meeting_id, account_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::NotJoined(meeting_id, account_id))?;
        purchases::delete_purchase(purchase.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🚪️ Account #{account_id} left meeting #{meeting_id}");
        Ok(())
    }

    async fn add_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        item: CapturedItem,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        if meeting.status != MeetingStatus::Gathering {
            return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status));
        }
        let purchase = purchases::fetch_purchase(meeting_id, account_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::NotJoined(meeting_id, account_id))?;
        let line = purchases::insert_line_item(purchase.id, item, quantity, &mut tx).await?;
        tx.commit().await?;
        trace!("🛒️ Line {} added to purchase #{} on meeting #{meeting_id}", line.id, purchase.id);
        Ok(line)
    }

    async fn update_quantity(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        if meeting.status != MeetingStatus::Gathering {
            return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status));
        }
        let line = purchases::update_line_item_quantity(meeting_id, account_id, line_item_id, quantity, &mut tx)
            .await?
            .ok_or(GroupOrderError::LineItemNotFound(line_item_id))?;
        tx.commit().await?;
        Ok(line)
    }

    async fn remove_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
    ) -> Result<(), GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
            .await?
            .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        if meeting.status != MeetingStatus::Gathering {
            return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status));
        }
        if !purchases::delete_line_item(meeting_id, account_id, line_item_id, &mut tx).await? {
            return Err(GroupOrderError::LineItemNotFound(line_item_id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn participant_subtotal(&self, meeting_id: i64, account_id: i64) -> Result<Money, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        purchases::participant_subtotal(meeting_id, account_id, &mut conn).await
    }

    async fn team_total(&self, meeting_id: i64) -> Result<TeamTotal, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut conn)
            .await?
            .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        let items_total = purchases::meeting_items_total(meeting_id, &mut conn).await?;
        Ok(TeamTotal {
            meeting_id,
            headcount: meeting.current_headcount,
            items_total,
            delivery_fee: meeting.delivery_fee,
        })
    }

    async fn lock_and_settle(&self, meeting_id: i64) -> Result<SettlementOutcome, GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let meeting = match meetings::try_lock_meeting(meeting_id, &mut tx).await? {
            Some(meeting) => meeting,
            None => {
                // The flip did not fire. Work out why.
                let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
                    .await?
                    .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
                match meeting.status {
                    MeetingStatus::Gathering => {
                        return Err(GroupOrderError::MinHeadcountNotMet(
                            meeting_id,
                            meeting.current_headcount,
                            meeting.min_headcount,
                        ));
                    },
                    MeetingStatus::Locked | MeetingStatus::Delivered => {
                        if let Some(team_snapshot) = snapshots::team_payment_for_meeting(meeting_id, &mut tx).await?
                        {
                            // Already settled: return what the earlier settlement produced.
                            let purchase_snapshots =
                                snapshots::purchase_payments_for_meeting(meeting_id, &mut tx).await?;
                            let spends = points::spends_for_meeting(meeting_id, &mut tx).await?;
                            debug!("🔒️ Meeting #{meeting_id} was already settled; nothing to do");
                            return Ok(SettlementOutcome {
                                meeting,
                                purchase_snapshots,
                                team_snapshot,
                                spends,
                                already_settled: true,
                            });
                        }
                        if meeting.status == MeetingStatus::Delivered {
                            return Err(GroupOrderError::SettlementIntegrity(
                                meeting_id,
                                "meeting is Delivered but has no settlement snapshots".to_string(),
                            ));
                        }
                        warn!("🔒️ Meeting #{meeting_id} is Locked without snapshots. Resuming settlement.");
                        meeting
                    },
                    MeetingStatus::Cancelled => {
                        return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status))
                    },
                }
            },
        };
        let outcome = self.write_settlement(meeting, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn cancel_meeting(&self, meeting_id: i64) -> Result<(Meeting, Vec<PointEntry>), GroupOrderError> {
        let mut tx = self.pool.begin().await?;
        let meeting = match meetings::try_cancel_meeting(meeting_id, &mut tx).await? {
            Some(meeting) => meeting,
            None => {
                let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut tx)
                    .await?
                    .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
                return Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status));
            },
        };
        // Compensate every point deduction the settlement recorded. The status guard above
        // makes this run at most once per meeting.
        let spends = points::spends_for_meeting(meeting_id, &mut tx).await?;
        let memo = format!("Refund for cancelled meeting #{meeting_id}");
        let mut refunds = Vec::with_capacity(spends.len());
        for spend in spends {
            let entry =
                points::credit(spend.account_id, Some(meeting_id), PointEntryType::Refund, spend.amount, &memo, &mut tx)
                    .await?;
            refunds.push(entry);
        }
        purchases::flip_active_purchases(meeting_id, PurchaseStatus::Cancelled, &mut tx).await?;
        tx.commit().await?;
        debug!("❌️ Meeting #{meeting_id} cancelled. {} participants refunded", refunds.len());
        Ok((meeting, refunds))
    }

    async fn mark_delivered(&self, meeting_id: i64) -> Result<Meeting, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        match meetings::try_mark_delivered(meeting_id, &mut conn).await? {
            Some(meeting) => Ok(meeting),
            None => {
                let meeting = meetings::fetch_meeting_by_id(meeting_id, &mut conn)
                    .await?
                    .ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
                Err(GroupOrderError::MeetingClosed(meeting_id, meeting.status))
            },
        }
    }

    async fn fetch_due_meetings(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        meetings::fetch_due_meetings(now, &mut conn).await
    }

    async fn fetch_team_snapshot(&self, meeting_id: i64) -> Result<Option<TeamPurchasePayment>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let snapshot = snapshots::team_payment_for_meeting(meeting_id, &mut conn).await?;
        Ok(snapshot)
    }

    async fn fetch_purchase_snapshots(&self, meeting_id: i64) -> Result<Vec<PurchasePayment>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let snapshots = snapshots::purchase_payments_for_meeting(meeting_id, &mut conn).await?;
        Ok(snapshots)
    }

    async fn fetch_purchase_snapshots_for_account(
        &self,
        meeting_id: i64,
        account_id: i64,
    ) -> Result<Vec<PurchasePayment>, GroupOrderError> {
        let mut conn = self.pool.acquire().await?;
        let snapshots = snapshots::purchase_payments_for_account(meeting_id, account_id, &mut conn).await?;
        Ok(snapshots)
    }

    async fn close(&mut self) -> Result<(), GroupOrderError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn create_account(&self, account: NewAccount) -> Result<Account, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::insert_account(account, &mut conn).await
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account_by_id(account_id, &mut conn).await?;
        Ok(account)
    }

    async fn record_earn(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let entry = points::credit(account_id, None, PointEntryType::Earn, amount, memo, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn record_spend(&self, account_id: i64, amount: Money, memo: &str) -> Result<PointEntry, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let entry = points::debit(account_id, None, amount, memo, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn record_refund(
        &self,
        account_id: i64,
        amount: Money,
        memo: &str,
    ) -> Result<PointEntry, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let entry = points::credit(account_id, None, PointEntryType::Refund, amount, memo, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn fetch_point_history(&self, account_id: i64) -> Result<Vec<PointEntry>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        points::entries_for_account(account_id, &mut conn).await
    }

    async fn withdrawal_blockers(&self, account_id: i64) -> Result<Vec<WithdrawalBlockReason>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account_by_id(account_id, &mut conn)
            .await?
            .ok_or(AccountApiError::AccountNotFound(account_id))?;
        accounts::withdrawal_blockers(&account, &mut conn).await
    }

    async fn withdraw_account(&self, account_id: i64) -> Result<Account, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::fetch_account_by_id(account_id, &mut tx)
            .await?
            .ok_or(AccountApiError::AccountNotFound(account_id))?;
        if account.is_withdrawn() {
            return Err(AccountApiError::AccountWithdrawn(account_id));
        }
        // Re-check the blockers inside the transaction so a join that commits concurrently
        // cannot slip under the withdrawal.
        let blockers = accounts::withdrawal_blockers(&account, &mut tx).await?;
        if !blockers.is_empty() {
            return Err(AccountApiError::WithdrawalBlocked(blockers));
        }
        let account = accounts::mark_withdrawn(account_id, &mut tx).await?;
        tx.commit().await?;
        info!("🧑️ Account #{account_id} withdrawn (soft delete)");
        Ok(account)
    }
}
