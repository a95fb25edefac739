//! AIS vessel tracker
//!
//! Resilient streaming ingestion of AIS position reports into a shared
//! SQLite store, plus a small read-only query API over it.

pub mod api;
pub mod config;
pub mod database;
pub mod decoder;
pub mod errors;
pub mod models;
pub mod stream;
