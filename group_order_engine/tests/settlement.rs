use chrono::{Duration, Utc};
use gos_common::Money;
use group_order_engine::{db_types::MeetingStatus, AccountApi, GroupOrderDatabase, GroupOrderError};
use tokio::runtime::Runtime;

mod support;

#[test]
fn lock_freezes_carts_into_snapshots() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("settle_snapshots").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "ss_leader", 100_000).await;
        let friend = support::seed_account(&db, "ss_friend", 100_000).await;
        let catalog = support::seed_catalog().await;
        let api = support::flow_api(db.clone(), catalog.clone());
        let meeting =
            api.create_meeting(support::open_meeting(leader.id, 2, 3).with_early_payment()).await.unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();

        api.add_line_item(meeting.id, leader.id, 1, 1).await.unwrap(); // 18 000
        api.add_line_item(meeting.id, friend.id, 2, 2).await.unwrap(); // 12 000

        let outcome = api.lock_meeting(meeting.id).await.unwrap();
        assert!(!outcome.already_settled);
        assert_eq!(outcome.meeting.status, MeetingStatus::Locked);
        assert!(outcome.meeting.locked_at.is_some());
        assert_eq!(outcome.purchase_snapshots.len(), 2);
        assert_eq!(outcome.team_snapshot.headcount, 2);
        assert_eq!(outcome.team_snapshot.items_total, Money::from(30_000));
        assert_eq!(outcome.team_snapshot.delivery_fee, Money::from(3_000));
        assert_eq!(outcome.team_snapshot.total_amount, Money::from(33_000));

        // Each participant paid their subtotal plus half the delivery fee.
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(100_000 - 18_000 - 1_500));
        assert_eq!(accounts.balance(friend.id).await.unwrap(), Money::from(100_000 - 12_000 - 1_500));
        assert_eq!(outcome.spends.len(), 2);
        assert!(outcome.spends.iter().all(|s| s.meeting_id == Some(meeting.id)));

        // Catalog edits after the lock must not leak into the frozen records.
        catalog.set_price(support::STORE_ID, 1, Money::from(99_000)).await.unwrap();
        assert_eq!(api.meeting_snapshots(meeting.id).await.unwrap().len(), 2);
        let snapshots = api.individual_snapshots(meeting.id, leader.id).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].unit_price, Money::from(18_000));
        assert_eq!(snapshots[0].menu_name, "Fried chicken");

        // And the carts are frozen too.
        let err = api.add_line_item(meeting.id, friend.id, 3, 1).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MeetingClosed(_, MeetingStatus::Locked)), "got {err}");
    });
}

#[test]
fn settlement_is_idempotent() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("settle_idempotent").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "si_leader", 50_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);
        let meeting =
            api.create_meeting(support::open_meeting(leader.id, 1, 3).with_early_payment()).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 2, 1).await.unwrap();

        let first = api.lock_meeting(meeting.id).await.unwrap();
        let second = api.lock_meeting(meeting.id).await.unwrap();
        assert!(second.already_settled);
        assert_eq!(first.team_snapshot, second.team_snapshot);
        assert_eq!(first.purchase_snapshots, second.purchase_snapshots);
        // No double charge.
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(50_000 - 6_000 - 3_000));
        assert_eq!(second.spends.len(), 1);
    });
}

#[test]
fn delivery_fee_remainder_goes_to_the_leader() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("settle_fee_split").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "fs_leader", 10_000).await;
        let friend = support::seed_account(&db, "fs_friend", 10_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);
        let meeting = api
            .create_meeting(
                support::open_meeting(leader.id, 2, 2).with_delivery_fee(Money::from(3_001)).with_early_payment(),
            )
            .await
            .unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 3, 1).await.unwrap();
        api.add_line_item(meeting.id, friend.id, 3, 1).await.unwrap();

        api.lock_meeting(meeting.id).await.unwrap();
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(10_000 - 2_500 - 1_501));
        assert_eq!(accounts.balance(friend.id).await.unwrap(), Money::from(10_000 - 2_500 - 1_500));
    });
}

#[test]
fn early_lock_needs_the_flag_and_the_minimum() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("settle_guards").await;
        let leader = support::seed_account(&db, "sg_leader", 50_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);

        let meeting = api.create_meeting(support::open_meeting(leader.id, 1, 3)).await.unwrap();
        let err = api.lock_meeting(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::EarlyPaymentNotAllowed(_)), "got {err}");

        let meeting =
            api.create_meeting(support::open_meeting(leader.id, 3, 5).with_early_payment()).await.unwrap();
        let err = api.lock_meeting(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MinHeadcountNotMet(_, 1, 3)), "got {err}");
        // The failed lock must not have moved the meeting.
        let meeting = api.fetch_meeting(meeting.id).await.unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Gathering);
    });
}

#[test]
fn insufficient_balance_aborts_the_whole_settlement() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("settle_poor").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "sp_leader", 100_000).await;
        let pauper = support::seed_account(&db, "sp_pauper", 1_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);
        let meeting =
            api.create_meeting(support::open_meeting(leader.id, 2, 2).with_early_payment()).await.unwrap();
        api.join_meeting(meeting.id, pauper.id).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 3, 1).await.unwrap();
        api.add_line_item(meeting.id, pauper.id, 1, 1).await.unwrap(); // 18 000, can't afford

        let err = api.lock_meeting(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::InsufficientBalance { .. }), "got {err}");

        // Everything rolled back: still gathering, nobody charged, no snapshots.
        let fetched = api.fetch_meeting(meeting.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, MeetingStatus::Gathering);
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(100_000));
        assert!(api.team_snapshot(meeting.id).await.unwrap().is_none());

        // Top the account up and the lock goes through.
        accounts.earn(pauper.id, Money::from(30_000), "Top up").await.unwrap();
        let outcome = api.lock_meeting(meeting.id).await.unwrap();
        assert!(!outcome.already_settled);
        assert_eq!(outcome.team_snapshot.items_total, Money::from(20_500));
    });
}

#[test]
fn cancellation_refunds_every_held_point() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("cancel_refunds").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "cr_leader", 40_000).await;
        let friend = support::seed_account(&db, "cr_friend", 40_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);
        let meeting =
            api.create_meeting(support::open_meeting(leader.id, 2, 2).with_early_payment()).await.unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 1, 1).await.unwrap();
        api.add_line_item(meeting.id, friend.id, 2, 1).await.unwrap();
        api.lock_meeting(meeting.id).await.unwrap();

        let event = api.cancel_meeting(meeting.id).await.unwrap();
        assert_eq!(event.meeting.status, MeetingStatus::Cancelled);
        assert_eq!(event.refunds.len(), 2);
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(40_000));
        assert_eq!(accounts.balance(friend.id).await.unwrap(), Money::from(40_000));

        // Cancelling twice must not mint points.
        let err = api.cancel_meeting(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MeetingClosed(_, MeetingStatus::Cancelled)), "got {err}");
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(40_000));
    });
}

#[test]
fn cancelling_a_gathering_meeting_refunds_nothing() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("cancel_gathering").await;
        let accounts = AccountApi::new(db.clone());
        let leader = support::seed_account(&db, "cg_leader", 40_000).await;
        let api = support::flow_api(db.clone(), support::seed_catalog().await);
        let meeting = api.create_meeting(support::open_meeting(leader.id, 2, 4)).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 1, 1).await.unwrap();

        let event = api.cancel_meeting(meeting.id).await.unwrap();
        assert!(event.refunds.is_empty());
        assert_eq!(accounts.balance(leader.id).await.unwrap(), Money::from(40_000));
    });
}

#[test]
fn deadline_sweep_locks_or_cancels() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("deadline_sweep").await;
        let leader = support::seed_account(&db, "dw_leader", 100_000).await;
        let catalog = support::seed_catalog().await;
        let api = support::flow_api(db.clone(), catalog);

        // Deadline validation lives in the API layer, so overdue meetings are seeded through
        // the backend directly.
        let mut overdue_full = support::open_meeting(leader.id, 1, 3);
        overdue_full.payment_available_at = Utc::now() - Duration::minutes(10);
        let full = db.create_meeting(overdue_full).await.unwrap();
        let line = api.add_line_item(full.id, leader.id, 2, 1).await.unwrap();
        api.update_quantity(full.id, leader.id, line.id, 2).await.unwrap();
        assert_eq!(api.team_total(full.id).await.unwrap().items_total, Money::from(12_000));

        let mut overdue_short = support::open_meeting(leader.id, 3, 5);
        overdue_short.payment_available_at = Utc::now() - Duration::minutes(10);
        let short = db.create_meeting(overdue_short).await.unwrap();

        let open = api.create_meeting(support::open_meeting(leader.id, 1, 3)).await.unwrap();

        let result = api.sweep_due_meetings(Utc::now()).await.unwrap();
        assert_eq!(result.total_count(), 2);
        assert!(result.failures.is_empty());
        assert_eq!(result.locked.len(), 1);
        assert_eq!(result.locked[0].meeting.id, full.id);
        assert_eq!(result.cancelled.len(), 1);
        assert_eq!(result.cancelled[0].id, short.id);

        assert_eq!(api.fetch_meeting(full.id).await.unwrap().unwrap().status, MeetingStatus::Locked);
        assert_eq!(api.fetch_meeting(short.id).await.unwrap().unwrap().status, MeetingStatus::Cancelled);
        assert_eq!(api.fetch_meeting(open.id).await.unwrap().unwrap().status, MeetingStatus::Gathering);

        // The sweep-lock wrote the same frozen records a manual lock would.
        let snapshots = api.meeting_snapshots(full.id).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].menu_name, "Tteokbokki");
        assert_eq!(snapshots[0].quantity, 2);
        assert_eq!(snapshots[0].unit_price, Money::from(6_000));
        let team = api.team_snapshot(full.id).await.unwrap().unwrap();
        assert_eq!(team.headcount, 1);
        assert_eq!(team.items_total, Money::from(12_000));
        assert_eq!(team.delivery_fee, Money::from(3_000));
        assert_eq!(team.total_amount, Money::from(15_000));

        // The cancelled meeting settled nothing; the locked one is closed to latecomers.
        assert!(api.team_snapshot(short.id).await.unwrap().is_none());
        let latecomer = support::seed_account(&db, "dw_latecomer", 10_000).await;
        let err = api.join_meeting(full.id, latecomer.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MeetingClosed(_, MeetingStatus::Locked)), "got {err}");

        // Nothing left to do; a second sweep is a no-op.
        let result = api.sweep_due_meetings(Utc::now()).await.unwrap();
        assert_eq!(result.total_count(), 0);
    });
}
