// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level query modules.
//!
//! Every function takes a `&rusqlite::Connection` (a `Transaction` derefs to
//! one) and returns `rusqlite::Result`, so callers decide the transaction
//! boundary inside a single `Connection::call` closure.

pub mod credentials;
pub mod key_meta;
pub mod migration_status;
pub mod proxies;

/// Map a text column into a strum-parsed enum, reporting a conversion failure.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a non-negative counter column.
pub(crate) fn count_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value.max(0) as u64)
}
