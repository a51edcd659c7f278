//! The deadline worker.
//!
//! Periodically sweeps for gathering meetings whose payment deadline has passed and resolves
//! each one: lock and settle when the minimum headcount was reached, cancel and refund when it
//! was not.

use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{catalog::MenuCatalog, db_types::Meeting, events::EventProducers, MeetingFlowApi, SqliteDatabase};

/// Starts the deadline worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_deadline_worker<C>(
    db: SqliteDatabase,
    catalog: C,
    producers: EventProducers,
    period: std::time::Duration,
) -> JoinHandle<()>
where
    C: MenuCatalog + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        let api = MeetingFlowApi::new(db, catalog, producers);
        info!("🕰️ Meeting deadline worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running meeting deadline sweep");
            match api.sweep_due_meetings(Utc::now()).await {
                Ok(result) => {
                    if result.total_count() > 0 || !result.failures.is_empty() {
                        info!(
                            "🕰️ Sweep resolved {} meetings ({} failures)",
                            result.total_count(),
                            result.failures.len()
                        );
                        let locked = result.locked.iter().map(|o| &o.meeting).collect::<Vec<_>>();
                        debug!("🕰️ {} meetings locked: {}", locked.len(), meeting_list(&locked));
                        let cancelled = result.cancelled.iter().collect::<Vec<_>>();
                        debug!("🕰️ {} meetings cancelled: {}", cancelled.len(), meeting_list(&cancelled));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running meeting deadline sweep: {e}");
                },
            }
        }
    })
}

fn meeting_list(meetings: &[&Meeting]) -> String {
    meetings
        .iter()
        .map(|m| format!("[{}] store: {} headcount: {}", m.id, m.store_id, m.current_headcount))
        .collect::<Vec<String>>()
        .join(", ")
}
