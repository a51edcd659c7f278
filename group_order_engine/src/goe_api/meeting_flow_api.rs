use std::fmt::Debug;

use chrono::{DateTime, Utc};
use gos_common::Money;
use log::*;

use crate::{
    catalog::MenuCatalog,
    db_types::{LineItem, Meeting, NewMeeting, Purchase, PurchasePayment, TeamPurchasePayment},
    events::{EventProducers, MeetingCancelledEvent, MeetingDeliveredEvent, MeetingLockedEvent},
    goe_api::meeting_objects::MeetingQueryFilter,
    traits::{CapturedItem, GroupOrderDatabase, GroupOrderError, SettlementOutcome, SweepResult, TeamTotal},
};

/// `MeetingFlowApi` is the primary API for the meeting lifecycle: creating and joining
/// meetings, editing carts while a meeting gathers, and driving the lock/settle and
/// cancel/refund transitions.
pub struct MeetingFlowApi<B, C> {
    db: B,
    catalog: C,
    producers: EventProducers,
}

impl<B, C> Debug for MeetingFlowApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MeetingFlowApi")
    }
}

impl<B, C> MeetingFlowApi<B, C> {
    pub fn new(db: B, catalog: C, producers: EventProducers) -> Self {
        Self { db, catalog, producers }
    }
}

impl<B, C> MeetingFlowApi<B, C>
where
    B: GroupOrderDatabase,
    C: MenuCatalog,
{
    /// Creates a new meeting in its gathering state, with the creator as leader and first
    /// participant.
    ///
    /// Validation happens here, before anything touches the database: the headcount range must
    /// be sane and the payment deadline must lie in the future.
    pub async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, GroupOrderError> {
        if meeting.min_headcount < 1 || meeting.min_headcount > meeting.max_headcount {
            return Err(GroupOrderError::InvalidHeadcountRange {
                min: meeting.min_headcount,
                max: meeting.max_headcount,
            });
        }
        if meeting.payment_available_at <= Utc::now() {
            return Err(GroupOrderError::InvalidDeadline);
        }
        let meeting = self.db.create_meeting(meeting).await?;
        debug!("🤝️📦️ Meeting #{} created, gathering until {}", meeting.id, meeting.payment_available_at);
        Ok(meeting)
    }

    pub async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, GroupOrderError> {
        self.db.fetch_meeting(meeting_id).await
    }

    pub async fn search_meetings(&self, filter: MeetingQueryFilter) -> Result<Vec<Meeting>, GroupOrderError> {
        trace!("🤝️📦️ Meeting search: {filter}");
        self.db.search_meetings(filter).await
    }

    /// Admits a participant. The capacity check-and-increment is atomic in the backend, so of
    /// two participants racing for the last slot exactly one succeeds.
    pub async fn join_meeting(&self, meeting_id: i64, account_id: i64) -> Result<Purchase, GroupOrderError> {
        self.db.join_meeting(meeting_id, account_id).await
    }

    pub async fn leave_meeting(&self, meeting_id: i64, account_id: i64) -> Result<(), GroupOrderError> {
        self.db.leave_meeting(meeting_id, account_id).await
    }

    /// Adds a menu item to the participant's cart. The catalog is consulted exactly once, here:
    /// the name, image, description and unit price on the cart line are whatever the catalog
    /// answered at this moment, and settlement later freezes these captured values, not a fresh
    /// read.
    pub async fn add_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        menu_id: i64,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError> {
        if quantity <= 0 {
            return Err(GroupOrderError::InvalidQuantity(quantity));
        }
        let meeting =
            self.db.fetch_meeting(meeting_id).await?.ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        let item = self.catalog.menu_item(meeting.store_id, menu_id).await?;
        let captured = CapturedItem {
            menu_id: item.menu_id,
            menu_name: item.name,
            image: item.image,
            menu_description: item.description,
            unit_price: item.unit_price,
        };
        self.db.add_line_item(meeting_id, account_id, captured, quantity).await
    }

    pub async fn update_quantity(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError> {
        if quantity <= 0 {
            return Err(GroupOrderError::InvalidQuantity(quantity));
        }
        self.db.update_quantity(meeting_id, account_id, line_item_id, quantity).await
    }

    pub async fn remove_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
    ) -> Result<(), GroupOrderError> {
        self.db.remove_line_item(meeting_id, account_id, line_item_id).await
    }

    pub async fn participant_subtotal(&self, meeting_id: i64, account_id: i64) -> Result<Money, GroupOrderError> {
        self.db.participant_subtotal(meeting_id, account_id).await
    }

    pub async fn team_total(&self, meeting_id: i64) -> Result<TeamTotal, GroupOrderError> {
        self.db.team_total(meeting_id).await
    }

    /// Explicit early lock by the leader, before the payment deadline. Only allowed when the
    /// meeting was created with early payment enabled; the minimum-headcount guard applies as
    /// at the deadline.
    pub async fn lock_meeting(&self, meeting_id: i64) -> Result<SettlementOutcome, GroupOrderError> {
        let meeting =
            self.db.fetch_meeting(meeting_id).await?.ok_or(GroupOrderError::MeetingNotFound(meeting_id))?;
        if !meeting.is_early_payment_available && meeting.payment_available_at > Utc::now() {
            return Err(GroupOrderError::EarlyPaymentNotAllowed(meeting_id));
        }
        let outcome = self.db.lock_and_settle(meeting_id).await?;
        self.call_meeting_locked_hook(&outcome).await;
        debug!("🔒️📦️ Meeting #{meeting_id} locked early. Total: {}", outcome.team_snapshot.total_amount);
        Ok(outcome)
    }

    /// Cancels a meeting and refunds any held points. Refund failures are retried a few times
    /// with backoff, since the ledger must eventually reflect the refund.
    pub async fn cancel_meeting(&self, meeting_id: i64) -> Result<MeetingCancelledEvent, GroupOrderError> {
        let mut attempt = 0u32;
        let (meeting, refunds) = loop {
            match self.db.cancel_meeting(meeting_id).await {
                Ok(result) => break result,
                Err(GroupOrderError::DatabaseError(e)) if attempt < 3 => {
                    attempt += 1;
                    warn!("❌️📦️ Cancellation of meeting #{meeting_id} failed ({e}). Retry {attempt}");
                    tokio::time::sleep(std::time::Duration::from_millis(50 << attempt)).await;
                },
                Err(e) => return Err(e),
            }
        };
        let event = MeetingCancelledEvent::new(meeting, refunds);
        self.call_meeting_cancelled_hook(&event).await;
        Ok(event)
    }

    pub async fn mark_delivered(&self, meeting_id: i64) -> Result<Meeting, GroupOrderError> {
        let meeting = self.db.mark_delivered(meeting_id).await?;
        for emitter in &self.producers.meeting_delivered_producer {
            emitter.publish_event(MeetingDeliveredEvent::new(meeting.clone())).await;
        }
        Ok(meeting)
    }

    /// The deadline sweep. Finds every gathering meeting whose payment deadline has passed and
    /// applies the lock guard to each independently: meetings that reached their minimum
    /// headcount are locked and settled, the rest are cancelled and refunded. One transaction
    /// per meeting, so a failure on one meeting leaves the others untouched, and the sweep is
    /// safe to re-run (at-least-once semantics; the settle and cancel transitions are
    /// idempotent).
    pub async fn sweep_due_meetings(&self, now: DateTime<Utc>) -> Result<SweepResult, GroupOrderError> {
        let due = self.db.fetch_due_meetings(now).await?;
        trace!("🕰️📦️ {} meetings due at {now}", due.len());
        let mut result = SweepResult::default();
        for meeting in due {
            let id = meeting.id;
            if meeting.current_headcount >= meeting.min_headcount {
                match self.db.lock_and_settle(id).await {
                    Ok(outcome) => {
                        self.call_meeting_locked_hook(&outcome).await;
                        result.locked.push(outcome);
                    },
                    // A concurrent early lock or leave may have raced us; the next sweep picks
                    // the meeting up again if it is still due.
                    Err(e) => {
                        error!("🕰️📦️ Could not settle meeting #{id}: {e}");
                        result.failures.push((id, e.to_string()));
                    },
                }
            } else {
                match self.db.cancel_meeting(id).await {
                    Ok((meeting, refunds)) => {
                        let event = MeetingCancelledEvent::new(meeting.clone(), refunds);
                        self.call_meeting_cancelled_hook(&event).await;
                        result.cancelled.push(meeting);
                    },
                    Err(e) => {
                        error!("🕰️📦️ Could not cancel meeting #{id}: {e}");
                        result.failures.push((id, e.to_string()));
                    },
                }
            }
        }
        debug!(
            "🕰️📦️ Sweep complete. {} locked, {} cancelled, {} failures",
            result.locked.len(),
            result.cancelled.len(),
            result.failures.len()
        );
        Ok(result)
    }

    pub async fn team_snapshot(&self, meeting_id: i64) -> Result<Option<TeamPurchasePayment>, GroupOrderError> {
        self.db.fetch_team_snapshot(meeting_id).await
    }

    pub async fn meeting_snapshots(&self, meeting_id: i64) -> Result<Vec<PurchasePayment>, GroupOrderError> {
        self.db.fetch_purchase_snapshots(meeting_id).await
    }

    pub async fn individual_snapshots(
        &self,
        meeting_id: i64,
        account_id: i64,
    ) -> Result<Vec<PurchasePayment>, GroupOrderError> {
        self.db.fetch_purchase_snapshots_for_account(meeting_id, account_id).await
    }

    async fn call_meeting_locked_hook(&self, outcome: &SettlementOutcome) {
        if outcome.already_settled {
            return;
        }
        for emitter in &self.producers.meeting_locked_producer {
            trace!("🔒️📦️ Notifying meeting-locked hook subscribers");
            let event =
                MeetingLockedEvent::new(outcome.meeting.clone(), outcome.team_snapshot.total_amount);
            emitter.publish_event(event).await;
        }
    }

    async fn call_meeting_cancelled_hook(&self, event: &MeetingCancelledEvent) {
        for emitter in &self.producers.meeting_cancelled_producer {
            trace!("❌️📦️ Notifying meeting-cancelled hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
