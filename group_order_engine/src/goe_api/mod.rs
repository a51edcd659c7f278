//! The public-facing API of the group-order engine.
//!
//! [`MeetingFlowApi`] drives the meeting lifecycle, cart mutation and settlement;
//! [`AccountApi`] covers the point ledger and account withdrawal. Both are generic over a
//! backend implementing the traits in [`crate::traits`].

pub mod accounts_api;
pub mod meeting_flow_api;
pub mod meeting_objects;
