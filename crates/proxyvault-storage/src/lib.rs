// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for proxyvault.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and a
//! single-writer concurrency model via `tokio-rusqlite`. Query modules are
//! synchronous row-level functions over `&rusqlite::Connection` so callers
//! can compose several of them inside one transaction in one `call` closure.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{map_tr_err, now_timestamp, Database};
pub use models::{KeyMetaRow, ProxyRow};
