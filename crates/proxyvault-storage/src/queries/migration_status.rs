// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The singleton credential-migration progress row (`id = 1`).

use proxyvault_core::types::{MigrationState, MigrationStatusRecord};
use rusqlite::{params, Connection, OptionalExtension};

use super::{count_column, parse_column};

/// Current status, or `None` if no migration has ever started.
pub fn get(conn: &Connection) -> rusqlite::Result<Option<MigrationStatusRecord>> {
    conn.query_row(
        "SELECT status, started_at, completed_at, total_count, migrated_count, failed_count, \
         last_processed_id, error_message FROM credential_migration_status WHERE id = 1",
        [],
        |row| {
            Ok(MigrationStatusRecord {
                status: parse_column(0, row.get(0)?)?,
                started_at: row.get(1)?,
                completed_at: row.get(2)?,
                total_count: count_column(row, 3)?,
                migrated_count: count_column(row, 4)?,
                failed_count: count_column(row, 5)?,
                last_processed_id: row.get(6)?,
                error_message: row.get(7)?,
            })
        },
    )
    .optional()
}

/// Enter `in_progress` for a new run, resetting counters.
pub fn begin(conn: &Connection, total_count: u64, started_at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO credential_migration_status \
         (id, status, started_at, completed_at, total_count, migrated_count, failed_count, \
          last_processed_id, error_message) \
         VALUES (1, ?1, ?2, NULL, ?3, 0, 0, NULL, NULL) \
         ON CONFLICT(id) DO UPDATE SET status = excluded.status, \
           started_at = excluded.started_at, completed_at = NULL, \
           total_count = excluded.total_count, migrated_count = 0, failed_count = 0, \
           last_processed_id = NULL, error_message = NULL",
        params![
            MigrationState::InProgress.to_string(),
            started_at,
            total_count as i64
        ],
    )?;
    Ok(())
}

/// Record progress after a row has been processed.
pub fn record_progress(
    conn: &Connection,
    migrated_count: u64,
    failed_count: u64,
    last_processed_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE credential_migration_status SET migrated_count = ?1, failed_count = ?2, \
         last_processed_id = ?3 WHERE id = 1",
        params![migrated_count as i64, failed_count as i64, last_processed_id],
    )?;
    Ok(())
}

/// Close out a run as `completed` or `failed`.
pub fn finish(
    conn: &Connection,
    status: MigrationState,
    completed_at: &str,
    error_message: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE credential_migration_status SET status = ?1, completed_at = ?2, \
         error_message = ?3 WHERE id = 1",
        params![status.to_string(), completed_at, error_message],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn lifecycle_pending_to_completed() {
        let conn = test_support::conn();
        assert!(get(&conn).unwrap().is_none());

        begin(&conn, 3, "t0").unwrap();
        record_progress(&conn, 1, 0, "a").unwrap();
        record_progress(&conn, 1, 1, "b").unwrap();
        let status = get(&conn).unwrap().unwrap();
        assert_eq!(status.status, MigrationState::InProgress);
        assert_eq!(status.failed_count, 1);
        assert_eq!(status.last_processed_id.as_deref(), Some("b"));

        finish(&conn, MigrationState::Failed, "t1", Some("1 of 3 rows failed")).unwrap();
        let status = get(&conn).unwrap().unwrap();
        assert_eq!(status.status, MigrationState::Failed);
        assert_eq!(status.completed_at.as_deref(), Some("t1"));
    }

    #[test]
    fn begin_resets_a_previous_run() {
        let conn = test_support::conn();
        begin(&conn, 2, "t0").unwrap();
        record_progress(&conn, 2, 0, "z").unwrap();
        finish(&conn, MigrationState::Completed, "t1", None).unwrap();

        begin(&conn, 5, "t2").unwrap();
        let status = get(&conn).unwrap().unwrap();
        assert_eq!(status.status, MigrationState::InProgress);
        assert_eq!(status.total_count, 5);
        assert_eq!(status.migrated_count, 0);
        assert_eq!(status.completed_at, None);
        assert_eq!(status.last_processed_id, None);
    }
}
