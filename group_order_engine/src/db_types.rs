//! Data types that are stored in, or read back from, the database.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gos_common::{Address, Money};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {0}: {1}")]
pub struct ConversionError(&'static str, String);

//--------------------------------------      Role        ------------------------------------------------------------
/// Accounts are either ordinary users (meeting participants) or entrepreneurs (store owners).
/// The distinction matters for withdrawal: an entrepreneur is additionally blocked by in-flight
/// orders against their store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
pub enum Role {
    User,
    Entrepreneur,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Entrepreneur => write!(f, "Entrepreneur"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Entrepreneur" => Ok(Self::Entrepreneur),
            s => Err(ConversionError("role", s.to_string())),
        }
    }
}

//--------------------------------------     Account      ------------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    /// Only set for entrepreneur accounts.
    pub store_id: Option<i64>,
    pub point_balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. A withdrawn account keeps its history.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_withdrawn(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub store_id: Option<i64>,
}

impl NewAccount {
    pub fn user<S1: Into<String>, S2: Into<String>>(email: S1, nickname: S2) -> Self {
        Self { email: email.into(), nickname: nickname.into(), role: Role::User, store_id: None }
    }

    pub fn entrepreneur<S1: Into<String>, S2: Into<String>>(email: S1, nickname: S2, store_id: i64) -> Self {
        Self { email: email.into(), nickname: nickname.into(), role: Role::Entrepreneur, store_id: Some(store_id) }
    }
}

//--------------------------------------   MeetingStatus  ------------------------------------------------------------
/// Meeting lifecycle. Transitions are monotonic:
/// `Gathering` → `Locked` → `Delivered`, with `Cancelled` reachable from `Gathering` and
/// `Locked`. Terminal meetings are kept for history and never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
pub enum MeetingStatus {
    /// Open for joins and cart edits.
    Gathering,
    /// Deadline reached or leader locked early; snapshots written, carts frozen.
    Locked,
    /// Terminal success.
    Delivered,
    /// Terminal failure or abort.
    Cancelled,
}

impl MeetingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Delivered | MeetingStatus::Cancelled)
    }

    /// "In progress" in the sense of the withdrawal guard: the meeting still carries
    /// obligations for its participants.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, MeetingStatus::Gathering | MeetingStatus::Locked)
    }
}

impl Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingStatus::Gathering => write!(f, "Gathering"),
            MeetingStatus::Locked => write!(f, "Locked"),
            MeetingStatus::Delivered => write!(f, "Delivered"),
            MeetingStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for MeetingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Gathering" => Ok(Self::Gathering),
            "Locked" => Ok(Self::Locked),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("meeting status", s.to_string())),
        }
    }
}

impl From<String> for MeetingStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid meeting status: {value}. But this conversion cannot fail. Defaulting to Gathering");
            MeetingStatus::Gathering
        })
    }
}

//--------------------------------------   PurchaseType   ------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
pub enum PurchaseType {
    /// Individual carts, one shared delivery.
    DeliveryTogether,
    /// The group eats together at the meet-up point.
    DiningTogether,
}

impl Display for PurchaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseType::DeliveryTogether => write!(f, "DeliveryTogether"),
            PurchaseType::DiningTogether => write!(f, "DiningTogether"),
        }
    }
}

//--------------------------------------      Meeting     ------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub store_id: i64,
    pub leader_id: i64,
    pub purchase_type: PurchaseType,
    pub min_headcount: i64,
    pub max_headcount: i64,
    pub current_headcount: i64,
    pub is_early_payment_available: bool,
    /// The payment deadline. When it passes, the deadline sweep locks or cancels the meeting.
    pub payment_available_at: DateTime<Utc>,
    pub delivery_fee: Money,
    pub delivery_address: Address,
    pub met_address: Address,
    pub status: MeetingStatus,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Implemented by hand because the two embedded addresses unpack from six flat columns.
#[cfg(feature = "sqlite")]
impl FromRow<'_, sqlx::sqlite::SqliteRow> for Meeting {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let purchase_type: PurchaseType = row.try_get("purchase_type")?;
        let status: MeetingStatus = row.try_get("status")?;
        let delivery_address = Address::new(
            row.try_get::<String, _>("delivery_postal")?,
            row.try_get::<String, _>("delivery_street")?,
            row.try_get::<String, _>("delivery_detail")?,
        );
        let met_address = Address::new(
            row.try_get::<String, _>("met_postal")?,
            row.try_get::<String, _>("met_street")?,
            row.try_get::<String, _>("met_detail")?,
        );
        Ok(Self {
            id: row.try_get("id")?,
            store_id: row.try_get("store_id")?,
            leader_id: row.try_get("leader_id")?,
            purchase_type,
            min_headcount: row.try_get("min_headcount")?,
            max_headcount: row.try_get("max_headcount")?,
            current_headcount: row.try_get("current_headcount")?,
            is_early_payment_available: row.try_get("is_early_payment_available")?,
            payment_available_at: row.try_get("payment_available_at")?,
            delivery_fee: row.try_get("delivery_fee")?,
            delivery_address,
            met_address,
            status,
            locked_at: row.try_get("locked_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------     NewMeeting   ------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub store_id: i64,
    pub leader_id: i64,
    pub purchase_type: PurchaseType,
    pub min_headcount: i64,
    pub max_headcount: i64,
    pub is_early_payment_available: bool,
    pub payment_available_at: DateTime<Utc>,
    pub delivery_fee: Money,
    pub delivery_address: Address,
    pub met_address: Address,
}

impl NewMeeting {
    pub fn new(store_id: i64, leader_id: i64, deadline: DateTime<Utc>) -> Self {
        Self {
            store_id,
            leader_id,
            purchase_type: PurchaseType::DeliveryTogether,
            min_headcount: 1,
            max_headcount: 1,
            is_early_payment_available: false,
            payment_available_at: deadline,
            delivery_fee: Money::default(),
            delivery_address: Address::default(),
            met_address: Address::default(),
        }
    }

    pub fn with_headcount(mut self, min: i64, max: i64) -> Self {
        self.min_headcount = min;
        self.max_headcount = max;
        self
    }

    pub fn with_delivery_fee(mut self, fee: Money) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn with_early_payment(mut self) -> Self {
        self.is_early_payment_available = true;
        self
    }

    pub fn with_addresses(mut self, delivery: Address, met: Address) -> Self {
        self.delivery_address = delivery;
        self.met_address = met;
        self
    }
}

//--------------------------------------  PurchaseStatus  ------------------------------------------------------------
/// Per-participant mirror of the meeting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
pub enum PurchaseStatus {
    /// Cart is editable while the meeting gathers.
    Open,
    /// Frozen by settlement.
    Locked,
    Cancelled,
}

impl Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseStatus::Open => write!(f, "Open"),
            PurchaseStatus::Locked => write!(f, "Locked"),
            PurchaseStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

//--------------------------------------     Purchase     ------------------------------------------------------------
/// One participant's cart within one meeting. At most one per (meeting, participant) pair.
#[derive(Debug, Clone, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub meeting_id: i64,
    pub account_id: i64,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     LineItem     ------------------------------------------------------------
/// A cart line. The menu fields are captured from the catalog when the line is added and are
/// never re-read, so a later catalog edit cannot change what this participant ordered.
#[derive(Debug, Clone, FromRow)]
pub struct LineItem {
    pub id: i64,
    pub purchase_id: i64,
    pub menu_id: i64,
    pub menu_name: String,
    pub image: String,
    pub menu_description: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LineItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------  PurchasePayment -----------------------------------------------------------
/// Immutable per-line settlement record, written exactly once when the meeting locks.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PurchasePayment {
    pub id: i64,
    pub meeting_id: i64,
    pub purchase_id: i64,
    pub account_id: i64,
    pub menu_name: String,
    pub image: String,
    pub menu_description: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl PurchasePayment {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//------------------------------------ TeamPurchasePayment ----------------------------------------------------------
/// Immutable meeting-level settlement record; one per locked meeting.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TeamPurchasePayment {
    pub id: i64,
    pub meeting_id: i64,
    pub headcount: i64,
    pub items_total: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  PointEntryType  -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
pub enum PointEntryType {
    Earn,
    Spend,
    Refund,
}

impl Display for PointEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointEntryType::Earn => write!(f, "Earn"),
            PointEntryType::Spend => write!(f, "Spend"),
            PointEntryType::Refund => write!(f, "Refund"),
        }
    }
}

//--------------------------------------    PointEntry    -----------------------------------------------------------
/// One balance-affecting event in an account's point ledger, with the running balance after it
/// was applied. The ledger is append-only; the balance never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PointEntry {
    pub id: i64,
    pub account_id: i64,
    /// Set when the entry was produced by meeting settlement or cancellation.
    pub meeting_id: Option<i64>,
    pub entry_type: PointEntryType,
    pub amount: Money,
    pub balance_after: Money,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}
