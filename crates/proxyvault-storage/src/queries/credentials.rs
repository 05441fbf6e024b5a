// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential record CRUD.

use proxyvault_core::types::{CredentialRecord, CredentialType};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{count_column, parse_column};

pub(crate) const COLUMNS: &str = "id, owner_entity_id, name, credential_type, encrypted_username, \
     encrypted_password, encryption_version, key_id, algorithm, access_level, created_at, \
     updated_at, last_accessed_at, access_count";

/// Map a row selected with [`COLUMNS`] starting at `offset`.
pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CredentialRecord> {
    Ok(CredentialRecord {
        id: row.get(offset)?,
        owner_entity_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        credential_type: parse_column(offset + 3, row.get(offset + 3)?)?,
        encrypted_username: row.get(offset + 4)?,
        encrypted_password: row.get(offset + 5)?,
        encryption_version: row.get(offset + 6)?,
        key_id: row.get(offset + 7)?,
        algorithm: row.get(offset + 8)?,
        access_level: parse_column(offset + 9, row.get(offset + 9)?)?,
        created_at: row.get(offset + 10)?,
        updated_at: row.get(offset + 11)?,
        last_accessed_at: row.get(offset + 12)?,
        access_count: count_column(row, offset + 13)?,
    })
}

/// Insert a new credential record.
pub fn insert(conn: &Connection, record: &CredentialRecord) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO credentials ({COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            record.id,
            record.owner_entity_id,
            record.name,
            record.credential_type.to_string(),
            record.encrypted_username,
            record.encrypted_password,
            record.encryption_version,
            record.key_id,
            record.algorithm,
            record.access_level.to_string(),
            record.created_at,
            record.updated_at,
            record.last_accessed_at,
            record.access_count as i64,
        ],
    )?;
    Ok(())
}

/// Fetch a credential record by id.
pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<CredentialRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM credentials WHERE id = ?1"),
        params![id],
        |row| from_row(row, 0),
    )
    .optional()
}

/// All records of one type, oldest first.
pub fn list_by_type(
    conn: &Connection,
    credential_type: CredentialType,
) -> rusqlite::Result<Vec<CredentialRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM credentials WHERE credential_type = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![credential_type.to_string()], |row| from_row(row, 0))?;
    rows.collect()
}

/// Every record, oldest first.
pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<CredentialRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM credentials ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map([], |row| from_row(row, 0))?;
    rows.collect()
}

/// Number of records, optionally restricted to one type.
pub fn count(conn: &Connection, credential_type: Option<CredentialType>) -> rusqlite::Result<u64> {
    let credential_type = credential_type.map(|t| t.to_string());
    conn.query_row(
        "SELECT COUNT(*) FROM credentials WHERE (?1 IS NULL OR credential_type = ?1)",
        params![credential_type],
        |row| count_column(row, 0),
    )
}

/// Whether a record with this id exists.
pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM credentials WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
}

/// Replace the encrypted fields of a record (rotation or re-keying).
///
/// Returns the number of rows touched (0 or 1).
pub fn update_secret(
    conn: &Connection,
    id: &str,
    encrypted_username: Option<&str>,
    encrypted_password: &str,
    key_id: &str,
    encryption_version: u32,
    updated_at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE credentials SET encrypted_username = ?2, encrypted_password = ?3, key_id = ?4, \
         encryption_version = ?5, updated_at = ?6 WHERE id = ?1",
        params![
            id,
            encrypted_username,
            encrypted_password,
            key_id,
            encryption_version,
            updated_at
        ],
    )
}

/// Bump `access_count` and stamp `last_accessed_at`.
pub fn record_access(conn: &Connection, id: &str, accessed_at: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE credentials SET access_count = access_count + 1, last_accessed_at = ?2 \
         WHERE id = ?1",
        params![id, accessed_at],
    )
}

/// Delete a record. Returns the number of rows removed.
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM credentials WHERE id = ?1", params![id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;
    use proxyvault_core::types::AccessLevel;

    fn record(id: &str, credential_type: CredentialType) -> CredentialRecord {
        CredentialRecord {
            id: id.to_string(),
            owner_entity_id: Some("owner".into()),
            name: format!("cred-{id}"),
            credential_type,
            encrypted_username: Some("aa:bb:cc".into()),
            encrypted_password: "dd:ee:ff".into(),
            encryption_version: 1,
            key_id: "0123456789abcdef".into(),
            algorithm: "aes-256-gcm".into(),
            access_level: AccessLevel::Restricted,
            created_at: format!("2026-01-01T00:00:0{id}.000Z"),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
            last_accessed_at: None,
            access_count: 0,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = test_support::conn();
        let rec = record("1", CredentialType::EntityAuth);
        insert(&conn, &rec).unwrap();
        assert_eq!(get(&conn, "1").unwrap(), Some(rec));
        assert_eq!(get(&conn, "missing").unwrap(), None);
    }

    #[test]
    fn list_and_count_filter_by_type() {
        let conn = test_support::conn();
        insert(&conn, &record("1", CredentialType::EntityAuth)).unwrap();
        insert(&conn, &record("2", CredentialType::ApiKey)).unwrap();
        insert(&conn, &record("3", CredentialType::EntityAuth)).unwrap();

        let auth = list_by_type(&conn, CredentialType::EntityAuth).unwrap();
        assert_eq!(
            auth.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
        assert_eq!(count(&conn, Some(CredentialType::ApiKey)).unwrap(), 1);
        assert_eq!(count(&conn, None).unwrap(), 3);
        assert_eq!(list_all(&conn).unwrap().len(), 3);
    }

    #[test]
    fn record_access_increments() {
        let conn = test_support::conn();
        insert(&conn, &record("1", CredentialType::EntityAuth)).unwrap();
        for _ in 0..3 {
            assert_eq!(record_access(&conn, "1", "2026-02-02T00:00:00.000Z").unwrap(), 1);
        }
        let rec = get(&conn, "1").unwrap().unwrap();
        assert_eq!(rec.access_count, 3);
        assert_eq!(rec.last_accessed_at.as_deref(), Some("2026-02-02T00:00:00.000Z"));
    }

    #[test]
    fn update_secret_and_delete() {
        let conn = test_support::conn();
        insert(&conn, &record("1", CredentialType::EntityAuth)).unwrap();
        let touched =
            update_secret(&conn, "1", None, "11:22:33", "fedcba9876543210", 1, "later").unwrap();
        assert_eq!(touched, 1);

        let rec = get(&conn, "1").unwrap().unwrap();
        assert_eq!(rec.encrypted_username, None);
        assert_eq!(rec.encrypted_password, "11:22:33");
        assert_eq!(rec.key_id, "fedcba9876543210");

        assert!(exists(&conn, "1").unwrap());
        assert_eq!(delete(&conn, "1").unwrap(), 1);
        assert!(!exists(&conn, "1").unwrap());
    }
}
