use gos_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Meeting, PointEntry, PurchasePayment, TeamPurchasePayment};

/// Menu details captured from the catalog at cart-add time. These values, not a fresh catalog
/// read, are what settlement later freezes into the payment snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedItem {
    pub menu_id: i64,
    pub menu_name: String,
    pub image: String,
    pub menu_description: String,
    pub unit_price: Money,
}

/// The meeting-level rollup while the meeting is gathering:
/// `total == items_total + delivery_fee` where `items_total` is the sum of all participant
/// subtotals. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamTotal {
    pub meeting_id: i64,
    pub headcount: i64,
    pub items_total: Money,
    pub delivery_fee: Money,
}

impl TeamTotal {
    pub fn total(&self) -> Money {
        self.items_total + self.delivery_fee
    }
}

/// Everything a successful settlement produced (or, on an idempotent re-run, everything the
/// earlier settlement already produced).
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub meeting: Meeting,
    pub purchase_snapshots: Vec<PurchasePayment>,
    pub team_snapshot: TeamPurchasePayment,
    pub spends: Vec<PointEntry>,
    /// True when this call found the meeting already settled and changed nothing.
    pub already_settled: bool,
}

/// Result of one deadline sweep. Each due meeting is processed in its own transaction, so a
/// failure on one meeting leaves the others untouched.
#[derive(Debug, Default)]
pub struct SweepResult {
    pub locked: Vec<SettlementOutcome>,
    pub cancelled: Vec<Meeting>,
    pub failures: Vec<(i64, String)>,
}

impl SweepResult {
    pub fn total_count(&self) -> usize {
        self.locked.len() + self.cancelled.len()
    }
}
