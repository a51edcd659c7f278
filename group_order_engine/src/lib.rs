//! Group Order Engine
//!
//! A coordination and settlement engine for group food-delivery orders. Participants gather
//! around a meeting, build individual carts against a shared store menu, and the engine locks,
//! settles and snapshots the whole order at the payment deadline (or earlier, if the leader
//! opted in to early payment).
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). Sqlite is the supported backend. You
//!    should never need to access the database directly. Instead, use the public API provided by
//!    the engine. The exception is the data types used in the database, defined in the
//!    `db_types` module, which are public.
//! 2. The engine public API ([`mod@goe_api`]). This provides the public-facing functionality:
//!    managing meetings, carts, settlement and accounts. Backends implement the traits in the
//!    [`mod@traits`] module in order to back the engine.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted
//! when certain actions occur within the engine, such as a meeting locking at its deadline. A
//! simple Actor framework is used so that you can easily hook into these events and perform
//! custom actions.
mod goe_api;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub mod catalog;
pub mod db_types;
pub mod events;
#[cfg(feature = "sqlite")]
pub mod expiry_worker;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use goe_api::{
    accounts_api::AccountApi,
    meeting_flow_api::MeetingFlowApi,
    meeting_objects::{self, MeetingQueryFilter},
};
pub use traits::{
    AccountApiError,
    AccountManagement,
    CapturedItem,
    GroupOrderDatabase,
    GroupOrderError,
    SettlementOutcome,
    SweepResult,
    TeamTotal,
    WithdrawalBlockReason,
};
