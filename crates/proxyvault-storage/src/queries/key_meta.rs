// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The singleton `key_meta` row.

use rusqlite::{params, Connection, OptionalExtension};

use crate::models::KeyMetaRow;

/// Stored key metadata, or `None` before the first unlock.
pub fn get(conn: &Connection) -> rusqlite::Result<Option<KeyMetaRow>> {
    conn.query_row(
        "SELECT kdf_salt, kdf_params, key_id, created_at, rotated_at FROM key_meta WHERE id = 1",
        [],
        |row| {
            Ok(KeyMetaRow {
                kdf_salt: row.get(0)?,
                kdf_params: row.get(1)?,
                key_id: row.get(2)?,
                created_at: row.get(3)?,
                rotated_at: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Write the first key metadata row. Fails if one already exists.
pub fn insert(conn: &Connection, meta: &KeyMetaRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO key_meta (id, kdf_salt, kdf_params, key_id, created_at, rotated_at) \
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
        params![
            meta.kdf_salt,
            meta.kdf_params,
            meta.key_id,
            meta.created_at,
            meta.rotated_at
        ],
    )?;
    Ok(())
}

/// Replace salt, parameters, and key id after a rotation.
pub fn rotate(
    conn: &Connection,
    kdf_salt: &[u8],
    kdf_params: &str,
    key_id: &str,
    rotated_at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE key_meta SET kdf_salt = ?1, kdf_params = ?2, key_id = ?3, rotated_at = ?4 \
         WHERE id = 1",
        params![kdf_salt, kdf_params, key_id, rotated_at],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn insert_get_rotate() {
        let conn = test_support::conn();
        assert!(get(&conn).unwrap().is_none());

        let meta = KeyMetaRow {
            kdf_salt: vec![7; 16],
            kdf_params: r#"{"memory_cost":65536}"#.into(),
            key_id: "aaaaaaaaaaaaaaaa".into(),
            created_at: "t0".into(),
            rotated_at: None,
        };
        insert(&conn, &meta).unwrap();
        assert_eq!(get(&conn).unwrap(), Some(meta.clone()));
        assert!(insert(&conn, &meta).is_err());

        assert_eq!(rotate(&conn, &[9; 16], "{}", "bbbbbbbbbbbbbbbb", "t1").unwrap(), 1);
        let rotated = get(&conn).unwrap().unwrap();
        assert_eq!(rotated.kdf_salt, vec![9; 16]);
        assert_eq!(rotated.key_id, "bbbbbbbbbbbbbbbb");
        assert_eq!(rotated.created_at, "t0");
        assert_eq!(rotated.rotated_at.as_deref(), Some("t1"));
    }
}
