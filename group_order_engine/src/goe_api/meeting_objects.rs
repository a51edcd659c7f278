use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::MeetingStatus;

/// Search criteria for meeting listings. Results are always ordered by payment deadline,
/// soonest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeetingQueryFilter {
    pub store_id: Option<i64>,
    pub leader_id: Option<i64>,
    pub status: Option<Vec<MeetingStatus>>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
}

impl MeetingQueryFilter {
    pub fn with_store_id(mut self, store_id: i64) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_leader_id(mut self, leader_id: i64) -> Self {
        self.leader_id = Some(leader_id);
        self
    }

    pub fn with_status(mut self, status: MeetingStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn due_before(mut self, t: DateTime<Utc>) -> Self {
        self.due_before = Some(t);
        self
    }

    pub fn due_after(mut self, t: DateTime<Utc>) -> Self {
        self.due_after = Some(t);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.store_id.is_none()
            && self.leader_id.is_none()
            && self.status.is_none()
            && self.due_before.is_none()
            && self.due_after.is_none()
    }
}

impl Display for MeetingQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(store_id) = self.store_id {
            write!(f, "store: {store_id}. ")?;
        }
        if let Some(leader_id) = self.leader_id {
            write!(f, "leader: {leader_id}. ")?;
        }
        if let Some(statuses) = &self.status {
            let s = statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            write!(f, "status: [{s}]. ")?;
        }
        if let Some(t) = self.due_before {
            write!(f, "due before: {t}. ")?;
        }
        if let Some(t) = self.due_after {
            write!(f, "due after: {t}. ")?;
        }
        Ok(())
    }
}
