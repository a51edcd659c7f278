use chrono::{DateTime, Utc};
use gos_common::Money;
use thiserror::Error;

use crate::{
    catalog::CatalogError,
    db_types::{
        LineItem,
        Meeting,
        MeetingStatus,
        NewMeeting,
        PointEntry,
        Purchase,
        PurchasePayment,
        TeamPurchasePayment,
    },
    goe_api::meeting_objects::MeetingQueryFilter,
    traits::{AccountApiError, AccountManagement, CapturedItem, SettlementOutcome, TeamTotal},
};

/// This trait defines the highest level of behaviour for backends supporting the group-order
/// engine.
///
/// This behaviour includes:
/// * The meeting lifecycle: create, join, leave, lock, cancel, deliver.
/// * Cart mutation while a meeting gathers, with add-time price capture.
/// * The atomic lock/settle transition that freezes carts into payment snapshots.
///
/// Admission control is the backend's responsibility: `join_meeting` must perform its
/// check-and-increment atomically so that concurrent joins can never push a meeting past its
/// maximum headcount.
#[allow(async_fn_in_trait)]
pub trait GroupOrderDatabase: Clone + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates the meeting in `Gathering` state. The leader is joined automatically: the
    /// headcount starts at one and the leader receives an open purchase. Range and deadline
    /// validation happens at the API layer before this is called.
    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, GroupOrderError>;

    async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, GroupOrderError>;

    /// Fetches meetings matching the filter, ordered by payment deadline ascending.
    async fn search_meetings(&self, filter: MeetingQueryFilter) -> Result<Vec<Meeting>, GroupOrderError>;

    /// Admits a participant to a gathering meeting and creates their (empty) purchase.
    ///
    /// In a single atomic transaction:
    /// * the headcount is incremented, guarded by `current_headcount < max_headcount`;
    /// * the purchase row is inserted.
    ///
    /// When two participants race for the last open slot, exactly one succeeds; the other
    /// receives [`GroupOrderError::CapacityExceeded`].
    async fn join_meeting(&self, meeting_id: i64, account_id: i64) -> Result<Purchase, GroupOrderError>;

    /// Removes a participant from a gathering meeting, deleting their purchase (and cart) and
    /// decrementing the headcount. The leader cannot leave; they must cancel instead.
    async fn leave_meeting(&self, meeting_id: i64, account_id: i64) -> Result<(), GroupOrderError>;

    /// Appends a line to the participant's cart using the menu details captured at call time.
    /// The meeting must still be gathering.
    async fn add_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        item: CapturedItem,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError>;

    /// Changes the quantity of an existing cart line. The meeting must still be gathering.
    async fn update_quantity(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
        quantity: i64,
    ) -> Result<LineItem, GroupOrderError>;

    /// Removes a cart line. The meeting must still be gathering.
    async fn remove_line_item(
        &self,
        meeting_id: i64,
        account_id: i64,
        line_item_id: i64,
    ) -> Result<(), GroupOrderError>;

    /// Sum of `quantity × unit_price` over the participant's cart. Pure read.
    async fn participant_subtotal(&self, meeting_id: i64, account_id: i64) -> Result<Money, GroupOrderError>;

    /// The meeting-level rollup: all participant subtotals plus the shared delivery fee.
    async fn team_total(&self, meeting_id: i64) -> Result<TeamTotal, GroupOrderError>;

    /// The lock/settle transition, in one atomic transaction per meeting:
    ///
    /// * the status flips `Gathering` → `Locked`, guarded by `current_headcount >= min_headcount`;
    /// * one [`PurchasePayment`] snapshot row is written per cart line, copying the values
    ///   captured at add time;
    /// * one [`TeamPurchasePayment`] row summarises the aggregate;
    /// * every purchase flips to `Locked`;
    /// * each participant's share (their subtotal plus their split of the delivery fee) is
    ///   deducted from their point balance as a `Spend` ledger entry.
    ///
    /// Either all of this commits or none of it does. The call is idempotent: if the meeting is
    /// already locked (a deadline sweep racing an early lock, say), the existing snapshots are
    /// returned with `already_settled` set. If the meeting is locked but has no snapshots, the
    /// settlement is resumed rather than duplicated.
    async fn lock_and_settle(&self, meeting_id: i64) -> Result<SettlementOutcome, GroupOrderError>;

    /// Cancels a meeting from `Gathering` or `Locked`. Any `Spend` entries recorded by
    /// settlement are compensated with matching `Refund` entries in the same transaction.
    /// Returns the refund entries.
    async fn cancel_meeting(&self, meeting_id: i64) -> Result<(Meeting, Vec<PointEntry>), GroupOrderError>;

    /// Marks a locked meeting as delivered. Terminal.
    async fn mark_delivered(&self, meeting_id: i64) -> Result<Meeting, GroupOrderError>;

    /// Gathering meetings whose payment deadline has passed, ready for the sweep.
    async fn fetch_due_meetings(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>, GroupOrderError>;

    /// The meeting's settlement summary, if it has been settled.
    async fn fetch_team_snapshot(&self, meeting_id: i64) -> Result<Option<TeamPurchasePayment>, GroupOrderError>;

    /// All per-line snapshots for the meeting, oldest first.
    async fn fetch_purchase_snapshots(&self, meeting_id: i64) -> Result<Vec<PurchasePayment>, GroupOrderError>;

    /// The per-line snapshots belonging to one participant of the meeting.
    async fn fetch_purchase_snapshots_for_account(
        &self,
        meeting_id: i64,
        account_id: i64,
    ) -> Result<Vec<PurchasePayment>, GroupOrderError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), GroupOrderError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum GroupOrderError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
    #[error("The requested meeting {0} does not exist")]
    MeetingNotFound(i64),
    #[error("Meeting {0} is no longer open. Current status: {1}")]
    MeetingClosed(i64, MeetingStatus),
    #[error("Meeting {0} is full ({1} participants)")]
    CapacityExceeded(i64, i64),
    #[error("Account {1} has already joined meeting {0}")]
    AlreadyJoined(i64, i64),
    #[error("Account {1} is not a participant of meeting {0}")]
    NotJoined(i64, i64),
    #[error("The leader cannot leave meeting {0}. Cancel the meeting instead.")]
    LeaderCannotLeave(i64),
    #[error("Invalid headcount range: min {min}, max {max}")]
    InvalidHeadcountRange { min: i64, max: i64 },
    #[error("The payment deadline must be in the future")]
    InvalidDeadline,
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),
    #[error("Line item {0} was not found in this cart")]
    LineItemNotFound(i64),
    #[error("Meeting {0} has {1} participants but needs at least {2} to lock")]
    MinHeadcountNotMet(i64, i64, i64),
    #[error("Early payment is not enabled for meeting {0}")]
    EarlyPaymentNotAllowed(i64),
    #[error("Account {account_id} has insufficient points: balance {balance}, required {required}")]
    InsufficientBalance { account_id: i64, balance: Money, required: Money },
    #[error("Settlement integrity fault on meeting {0}: {1}")]
    SettlementIntegrity(i64, String),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
}

impl From<sqlx::Error> for GroupOrderError {
    fn from(e: sqlx::Error) -> Self {
        GroupOrderError::DatabaseError(e.to_string())
    }
}
