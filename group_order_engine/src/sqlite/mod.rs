//! SQLite backend for the group-order engine.

mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
