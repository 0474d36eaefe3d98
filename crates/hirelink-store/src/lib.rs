//! # hirelink-store
//!
//! SQLite persistence for the Hirelink messaging core.
//!
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers for the message store plus the
//! minimal `users` and `jobs` reference tables messaging depends on
//! (credential resolution, receiver-existence checks, display names).
//! Conversations are computed views over `messages` -- there is no
//! conversation table.

pub mod database;
pub mod jobs;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
