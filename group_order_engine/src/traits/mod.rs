//! Interface contracts for engine database backends.
//!
//! * [`GroupOrderDatabase`] defines the highest level of behaviour for backends supporting the
//!   engine: the meeting lifecycle, cart mutation, and the lock/settle transition.
//! * [`AccountManagement`] covers the point ledger and the withdrawal guard.
//!
//! All multi-step aggregate mutations (join, leave, lock, settle, cancel) must execute inside a
//! single atomic transaction scoped to one meeting. Meetings are independent aggregates; no
//! cross-meeting locking is required.

mod account_management;
mod data_objects;
mod group_order_database;

pub use account_management::{AccountApiError, AccountManagement, WithdrawalBlockReason};
pub use data_objects::{CapturedItem, SettlementOutcome, SweepResult, TeamTotal};
pub use group_order_database::{GroupOrderDatabase, GroupOrderError};
