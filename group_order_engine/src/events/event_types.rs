use gos_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Meeting, PointEntry};

/// Published after a meeting has been locked and settled. Carries the settled totals so a
/// notifier does not need to query the snapshots back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingLockedEvent {
    pub meeting: Meeting,
    pub total_amount: Money,
}

impl MeetingLockedEvent {
    pub fn new(meeting: Meeting, total_amount: Money) -> Self {
        Self { meeting, total_amount }
    }
}

/// Published after a meeting has been cancelled, whether by the leader or by the deadline sweep
/// failing the minimum headcount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingCancelledEvent {
    pub meeting: Meeting,
    pub refunds: Vec<PointEntry>,
}

impl MeetingCancelledEvent {
    pub fn new(meeting: Meeting, refunds: Vec<PointEntry>) -> Self {
        Self { meeting, refunds }
    }
}

/// Published when a locked meeting is marked as delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDeliveredEvent {
    pub meeting: Meeting,
}

impl MeetingDeliveredEvent {
    pub fn new(meeting: Meeting) -> Self {
        Self { meeting }
    }
}
