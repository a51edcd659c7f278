use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use log::*;
use tokio::runtime::Runtime;

use group_order_engine::{
    events::{EventHandlers, EventHooks},
    MeetingFlowApi,
};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[test]
fn on_meeting_locked_and_cancelled() {
    let rt = Runtime::new().unwrap();
    let locked = HookCalled::default();
    let cancelled = HookCalled::default();
    let locked_copy = locked.clone();
    let cancelled_copy = cancelled.clone();
    rt.block_on(async move {
        let db = support::new_database("hooks").await;
        let mut hooks = EventHooks::default();
        hooks
            .on_meeting_locked(move |ev| {
                info!("🪝️ Meeting #{} locked for {}", ev.meeting.id, ev.total_amount);
                let locked_copy = locked_copy.clone();
                Box::pin(async move { locked_copy.called() })
            })
            .on_meeting_cancelled(move |ev| {
                info!("🪝️ Meeting #{} cancelled, {} refunds", ev.meeting.id, ev.refunds.len());
                let cancelled_copy = cancelled_copy.clone();
                Box::pin(async move { cancelled_copy.called() })
            });
        let handlers = EventHandlers::new(10, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let leader = support::seed_account(&db, "hook_leader", 50_000).await;
        let api = MeetingFlowApi::new(db.clone(), support::seed_catalog().await, producers);

        let settled =
            api.create_meeting(support::open_meeting(leader.id, 1, 3).with_early_payment()).await.unwrap();
        api.add_line_item(settled.id, leader.id, 3, 1).await.unwrap();
        api.lock_meeting(settled.id).await.unwrap();
        // An idempotent re-lock must not fire the hook again.
        api.lock_meeting(settled.id).await.unwrap();

        let doomed = api.create_meeting(support::open_meeting(leader.id, 2, 3)).await.unwrap();
        api.cancel_meeting(doomed.id).await.unwrap();

        // Delivery is async; give the spawned handlers a beat.
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    });
    assert_eq!(locked.count(), 1);
    assert_eq!(cancelled.count(), 1);
    info!("🪝️ test complete");
}
