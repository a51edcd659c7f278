//! The store-catalog boundary.
//!
//! The engine never owns menu data. Prices, names and images come from an external catalog
//! service and are read exactly once, at cart-add time. [`MenuCatalog`] is the seam; the
//! [`InMemoryCatalog`] implementation exists for tests and embedded use.

use std::{collections::HashMap, sync::Arc};

use gos_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A menu entry as the catalog currently advertises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub menu_id: i64,
    pub name: String,
    pub image: String,
    pub description: String,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Menu item {menu_id} was not found at store {store_id}")]
    MenuNotFound { store_id: i64, menu_id: i64 },
    #[error("Catalog lookup failed: {0}")]
    LookupFailed(String),
}

/// Read-only menu lookup. The engine trusts whatever the catalog answers at call time; nothing
/// is re-read at lock time.
#[allow(async_fn_in_trait)]
pub trait MenuCatalog: Clone {
    async fn menu_item(&self, store_id: i64, menu_id: i64) -> Result<MenuItem, CatalogError>;
}

/// A catalog backed by a shared map. Mutable so tests can exercise the snapshot-immutability
/// guarantee by editing prices after a meeting locks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<(i64, i64), MenuItem>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_item(&self, store_id: i64, item: MenuItem) {
        self.items.write().await.insert((store_id, item.menu_id), item);
    }

    pub async fn set_price(&self, store_id: i64, menu_id: i64, price: Money) -> Result<(), CatalogError> {
        let mut items = self.items.write().await;
        match items.get_mut(&(store_id, menu_id)) {
            Some(item) => {
                item.unit_price = price;
                Ok(())
            },
            None => Err(CatalogError::MenuNotFound { store_id, menu_id }),
        }
    }

    pub async fn remove_item(&self, store_id: i64, menu_id: i64) {
        self.items.write().await.remove(&(store_id, menu_id));
    }
}

impl MenuCatalog for InMemoryCatalog {
    async fn menu_item(&self, store_id: i64, menu_id: i64) -> Result<MenuItem, CatalogError> {
        self.items
            .read()
            .await
            .get(&(store_id, menu_id))
            .cloned()
            .ok_or(CatalogError::MenuNotFound { store_id, menu_id })
    }
}
