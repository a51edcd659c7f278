#![allow(dead_code)]

use chrono::{Duration, Utc};
use gos_common::Money;
use group_order_engine::{
    catalog::{InMemoryCatalog, MenuItem},
    db_types::{Account, NewAccount, NewMeeting},
    events::EventProducers,
    test_utils::prepare_env::prepare_test_env,
    AccountApi,
    MeetingFlowApi,
    SqliteDatabase,
};

pub const STORE_ID: i64 = 1;

pub async fn new_database(name: &str) -> SqliteDatabase {
    let url = format!("sqlite://../data/test_{name}.db");
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating database")
}

pub fn flow_api(db: SqliteDatabase, catalog: InMemoryCatalog) -> MeetingFlowApi<SqliteDatabase, InMemoryCatalog> {
    MeetingFlowApi::new(db, catalog, EventProducers::default())
}

/// Creates a user account and credits it with a starting balance.
pub async fn seed_account(db: &SqliteDatabase, nickname: &str, points: i64) -> Account {
    let api = AccountApi::new(db.clone());
    let account = api
        .register(NewAccount::user(format!("{nickname}@example.com"), nickname))
        .await
        .expect("Error creating account");
    if points > 0 {
        api.earn(account.id, Money::from(points), "Signup bonus").await.expect("Error crediting account");
    }
    account
}

/// A store catalog with a couple of menu items to build carts from.
pub async fn seed_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    catalog
        .put_item(STORE_ID, MenuItem {
            menu_id: 1,
            name: "Fried chicken".to_string(),
            image: "chicken.jpg".to_string(),
            description: "Half and half".to_string(),
            unit_price: Money::from(18_000),
        })
        .await;
    catalog
        .put_item(STORE_ID, MenuItem {
            menu_id: 2,
            name: "Tteokbokki".to_string(),
            image: "tteokbokki.jpg".to_string(),
            description: "Medium spicy".to_string(),
            unit_price: Money::from(6_000),
        })
        .await;
    catalog
        .put_item(STORE_ID, MenuItem {
            menu_id: 3,
            name: "Cola 1.5L".to_string(),
            image: "cola.jpg".to_string(),
            description: "Shared bottle".to_string(),
            unit_price: Money::from(2_500),
        })
        .await;
    catalog
}

/// A meeting gathering until an hour from now.
pub fn open_meeting(leader_id: i64, min: i64, max: i64) -> NewMeeting {
    NewMeeting::new(STORE_ID, leader_id, Utc::now() + Duration::hours(1))
        .with_headcount(min, max)
        .with_delivery_fee(Money::from(3_000))
}
