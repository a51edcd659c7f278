use chrono::{Duration, Utc};
use gos_common::Money;
use group_order_engine::{db_types::MeetingStatus, GroupOrderError, MeetingQueryFilter};
use tokio::runtime::Runtime;

mod support;

#[test]
fn meeting_creation_is_validated() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("meeting_validation").await;
        let leader = support::seed_account(&db, "val_leader", 10_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);

        let err = api.create_meeting(support::open_meeting(leader.id, 5, 3)).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::InvalidHeadcountRange { min: 5, max: 3 }), "got {err}");

        let mut stale = support::open_meeting(leader.id, 2, 3);
        stale.payment_available_at = Utc::now() - Duration::minutes(5);
        let err = api.create_meeting(stale).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::InvalidDeadline), "got {err}");
    });
}

#[test]
fn leader_is_admitted_at_creation() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("leader_admission").await;
        let leader = support::seed_account(&db, "la_leader", 10_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);

        let meeting = api.create_meeting(support::open_meeting(leader.id, 1, 4)).await.unwrap();
        assert_eq!(meeting.current_headcount, 1);
        // The leader already has a cart.
        let line = api.add_line_item(meeting.id, leader.id, 2, 1).await.unwrap();
        assert_eq!(line.unit_price, Money::from(6_000));
    });
}

#[test]
fn cart_totals_roll_up() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("cart_totals").await;
        let leader = support::seed_account(&db, "ct_leader", 100_000).await;
        let friend = support::seed_account(&db, "ct_friend", 100_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);
        let meeting = api.create_meeting(support::open_meeting(leader.id, 2, 4)).await.unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();

        // Leader: chicken + two colas. Friend: tteokbokki.
        api.add_line_item(meeting.id, leader.id, 1, 1).await.unwrap();
        api.add_line_item(meeting.id, leader.id, 3, 2).await.unwrap();
        api.add_line_item(meeting.id, friend.id, 2, 1).await.unwrap();

        assert_eq!(api.participant_subtotal(meeting.id, leader.id).await.unwrap(), Money::from(23_000));
        assert_eq!(api.participant_subtotal(meeting.id, friend.id).await.unwrap(), Money::from(6_000));

        let total = api.team_total(meeting.id).await.unwrap();
        assert_eq!(total.headcount, 2);
        assert_eq!(total.items_total, Money::from(29_000));
        assert_eq!(total.delivery_fee, Money::from(3_000));
        assert_eq!(total.total(), Money::from(32_000));
    });
}

#[test]
fn cart_edits_are_scoped_and_validated() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("cart_edits").await;
        let leader = support::seed_account(&db, "ce_leader", 100_000).await;
        let friend = support::seed_account(&db, "ce_friend", 100_000).await;
        let outsider = support::seed_account(&db, "ce_outsider", 100_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);
        let meeting = api.create_meeting(support::open_meeting(leader.id, 2, 4)).await.unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();

        let err = api.add_line_item(meeting.id, leader.id, 1, 0).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::InvalidQuantity(0)), "got {err}");

        let err = api.add_line_item(meeting.id, leader.id, 999, 1).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::Catalog(_)), "got {err}");

        let err = api.add_line_item(meeting.id, outsider.id, 1, 1).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::NotJoined(_, _)), "got {err}");

        let line = api.add_line_item(meeting.id, leader.id, 1, 1).await.unwrap();
        let line = api.update_quantity(meeting.id, leader.id, line.id, 3).await.unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.line_total(), Money::from(54_000));

        // A participant cannot touch somebody else's cart line.
        let err = api.update_quantity(meeting.id, friend.id, line.id, 1).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::LineItemNotFound(_)), "got {err}");
        let err = api.remove_line_item(meeting.id, friend.id, line.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::LineItemNotFound(_)), "got {err}");

        api.remove_line_item(meeting.id, leader.id, line.id).await.unwrap();
        assert_eq!(api.participant_subtotal(meeting.id, leader.id).await.unwrap(), Money::from(0));
    });
}

#[test]
fn leaving_a_meeting() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("leaving").await;
        let leader = support::seed_account(&db, "lv_leader", 100_000).await;
        let friend = support::seed_account(&db, "lv_friend", 100_000).await;
        let outsider = support::seed_account(&db, "lv_outsider", 100_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);
        let meeting = api.create_meeting(support::open_meeting(leader.id, 1, 4)).await.unwrap();
        api.join_meeting(meeting.id, friend.id).await.unwrap();
        api.add_line_item(meeting.id, friend.id, 2, 2).await.unwrap();

        let err = api.leave_meeting(meeting.id, leader.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::LeaderCannotLeave(_)), "got {err}");

        let err = api.leave_meeting(meeting.id, outsider.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::NotJoined(_, _)), "got {err}");

        api.leave_meeting(meeting.id, friend.id).await.unwrap();
        let meeting = api.fetch_meeting(meeting.id).await.unwrap().unwrap();
        assert_eq!(meeting.current_headcount, 1);
        // The cart went with the purchase.
        assert_eq!(api.participant_subtotal(meeting.id, friend.id).await.unwrap(), Money::from(0));
        let total = api.team_total(meeting.id).await.unwrap();
        assert_eq!(total.items_total, Money::from(0));
    });
}

#[test]
fn meeting_search_filters_compose() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("meeting_search").await;
        let alice = support::seed_account(&db, "ms_alice", 50_000).await;
        let bob = support::seed_account(&db, "ms_bob", 50_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);

        let m1 = api.create_meeting(support::open_meeting(alice.id, 1, 3)).await.unwrap();
        let m2 = api.create_meeting(support::open_meeting(bob.id, 1, 3)).await.unwrap();
        api.cancel_meeting(m2.id).await.unwrap();

        let all = api.search_meetings(MeetingQueryFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let alices = api
            .search_meetings(MeetingQueryFilter::default().with_leader_id(alice.id))
            .await
            .unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].id, m1.id);

        let gathering = api
            .search_meetings(
                MeetingQueryFilter::default()
                    .with_store_id(support::STORE_ID)
                    .with_status(MeetingStatus::Gathering),
            )
            .await
            .unwrap();
        assert_eq!(gathering.len(), 1);
        assert_eq!(gathering[0].id, m1.id);

        let due_soon = api
            .search_meetings(MeetingQueryFilter::default().due_before(Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(due_soon.len(), 2);
        let none = api
            .search_meetings(MeetingQueryFilter::default().due_after(Utc::now() + Duration::days(1)))
            .await
            .unwrap();
        assert!(none.is_empty());
    });
}

#[test]
fn delivery_requires_a_locked_meeting() {
    let sys = Runtime::new().unwrap();

    sys.block_on(async move {
        let db = support::new_database("delivery_guard").await;
        let leader = support::seed_account(&db, "dg_leader", 100_000).await;
        let api = support::flow_api(db, support::seed_catalog().await);
        let meeting = api
            .create_meeting(support::open_meeting(leader.id, 1, 4).with_early_payment())
            .await
            .unwrap();

        let err = api.mark_delivered(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MeetingClosed(_, _)), "got {err}");

        api.add_line_item(meeting.id, leader.id, 3, 1).await.unwrap();
        api.lock_meeting(meeting.id).await.unwrap();
        let meeting = api.mark_delivered(meeting.id).await.unwrap();
        assert!(meeting.status.is_terminal());

        // Terminal means terminal.
        let err = api.mark_delivered(meeting.id).await.unwrap_err();
        assert!(matches!(err, GroupOrderError::MeetingClosed(_, _)), "got {err}");
    });
}
