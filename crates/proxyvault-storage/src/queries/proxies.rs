// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proxy row CRUD, including the legacy plaintext columns.

use proxyvault_core::types::{CredentialRecord, ProxyFilter};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::count_column;
use crate::models::ProxyRow;

const COLUMNS: &str = "p.id, p.name, p.host, p.port, p.protocol, p.enabled, p.username, \
     p.password, p.credential_id, p.created_at, p.updated_at";

const PROXY_COLUMN_COUNT: usize = 11;

const HAS_PLAINTEXT: &str = "((p.username IS NOT NULL AND p.username <> '') \
     OR (p.password IS NOT NULL AND p.password <> ''))";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ProxyRow> {
    Ok(ProxyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        protocol: row.get(4)?,
        enabled: row.get(5)?,
        username: row.get(6)?,
        password: row.get(7)?,
        credential_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a proxy row exactly as given.
pub fn insert(conn: &Connection, row: &ProxyRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO proxies (id, name, host, port, protocol, enabled, username, password, \
         credential_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            row.id,
            row.name,
            row.host,
            row.port,
            row.protocol,
            row.enabled,
            row.username,
            row.password,
            row.credential_id,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

/// Fetch a proxy row by id.
pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<ProxyRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM proxies p WHERE p.id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Fetch a proxy row and its linked credential record in one LEFT JOIN.
pub fn get_with_credential(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<(ProxyRow, Option<CredentialRecord>)>> {
    let sql = format!(
        "SELECT {COLUMNS}, {cred} FROM proxies p \
         LEFT JOIN credentials c ON c.id = p.credential_id WHERE p.id = ?1",
        cred = qualified_credential_columns(),
    );
    conn.query_row(&sql, params![id], |row| {
        let proxy = from_row(row)?;
        let credential_id: Option<String> = row.get(PROXY_COLUMN_COUNT)?;
        let credential = match credential_id {
            Some(_) => Some(super::credentials::from_row(row, PROXY_COLUMN_COUNT)?),
            None => None,
        };
        Ok((proxy, credential))
    })
    .optional()
}

fn qualified_credential_columns() -> String {
    super::credentials::COLUMNS
        .split(", ")
        .map(|c| format!("c.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// List proxies matching `filter`, ordered by name.
///
/// Each filter field binds as a parameter; `NULL` disables that predicate.
pub fn list(conn: &Connection, filter: &ProxyFilter) -> rusqlite::Result<Vec<ProxyRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM proxies p \
         WHERE (?1 IS NULL OR p.protocol = ?1) \
           AND (?2 IS NULL OR p.enabled = ?2) \
           AND (?3 IS NULL OR (p.credential_id IS NOT NULL) = ?3) \
         ORDER BY p.name"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.protocol.map(|p| p.to_string()),
            filter.enabled,
            filter.has_credentials,
        ],
        from_row,
    )?;
    rows.collect()
}

/// Rewrite the non-secret fields of a proxy. Legacy columns are left alone.
pub fn update_details(conn: &Connection, row: &ProxyRow) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE proxies SET name = ?2, host = ?3, port = ?4, protocol = ?5, enabled = ?6, \
         updated_at = ?7 WHERE id = ?1",
        params![
            row.id,
            row.name,
            row.host,
            row.port,
            row.protocol,
            row.enabled,
            row.updated_at,
        ],
    )
}

/// Point a proxy at a credential record (or unlink it with `None`).
pub fn set_credential(
    conn: &Connection,
    id: &str,
    credential_id: Option<&str>,
    updated_at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE proxies SET credential_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, credential_id, updated_at],
    )
}

/// Link a migrated credential and clear the legacy plaintext in one statement.
pub fn link_and_clear_plaintext(
    conn: &Connection,
    id: &str,
    credential_id: &str,
    updated_at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE proxies SET credential_id = ?2, username = NULL, password = NULL, \
         updated_at = ?3 WHERE id = ?1",
        params![id, credential_id, updated_at],
    )
}

/// Clear the legacy plaintext columns without touching the link.
pub fn clear_plaintext(conn: &Connection, id: &str, updated_at: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE proxies SET username = NULL, password = NULL, updated_at = ?2 WHERE id = ?1",
        params![id, updated_at],
    )
}

/// Delete a proxy row. Returns the number of rows removed.
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM proxies WHERE id = ?1", params![id])
}

/// Whether the proxy exists and links to an existing credential record.
pub fn has_credential(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM proxies p \
         JOIN credentials c ON c.id = p.credential_id WHERE p.id = ?1)",
        params![id],
        |row| row.get(0),
    )
}

/// Rows still carrying legacy plaintext, ordered by id.
pub fn list_plaintext(conn: &Connection) -> rusqlite::Result<Vec<ProxyRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM proxies p WHERE {HAS_PLAINTEXT} ORDER BY p.id"
    ))?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect()
}

/// Number of rows still carrying legacy plaintext.
pub fn count_plaintext(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM proxies p WHERE {HAS_PLAINTEXT}"),
        [],
        |row| count_column(row, 0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{credentials, test_support};
    use proxyvault_core::types::{AccessLevel, CredentialType, ProxyProtocol};

    fn proxy(id: &str, name: &str, protocol: &str) -> ProxyRow {
        ProxyRow {
            id: id.into(),
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 3128,
            protocol: protocol.into(),
            enabled: true,
            username: None,
            password: None,
            credential_id: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn credential(id: &str) -> CredentialRecord {
        CredentialRecord {
            id: id.into(),
            owner_entity_id: None,
            name: "c".into(),
            credential_type: CredentialType::EntityAuth,
            encrypted_username: None,
            encrypted_password: "a:b:c".into(),
            encryption_version: 1,
            key_id: "k".into(),
            algorithm: "aes-256-gcm".into(),
            access_level: AccessLevel::Standard,
            created_at: "t".into(),
            updated_at: "t".into(),
            last_accessed_at: None,
            access_count: 0,
        }
    }

    #[test]
    fn join_returns_credential_when_linked() {
        let conn = test_support::conn();
        credentials::insert(&conn, &credential("c1")).unwrap();
        let mut row = proxy("p1", "one", "http");
        row.credential_id = Some("c1".into());
        insert(&conn, &row).unwrap();
        insert(&conn, &proxy("p2", "two", "http")).unwrap();

        let (found, cred) = get_with_credential(&conn, "p1").unwrap().unwrap();
        assert_eq!(found, row);
        assert_eq!(cred.unwrap().id, "c1");

        let (_, cred) = get_with_credential(&conn, "p2").unwrap().unwrap();
        assert!(cred.is_none());
        assert!(get_with_credential(&conn, "nope").unwrap().is_none());

        assert!(has_credential(&conn, "p1").unwrap());
        assert!(!has_credential(&conn, "p2").unwrap());
    }

    #[test]
    fn filter_binds_each_predicate() {
        let conn = test_support::conn();
        credentials::insert(&conn, &credential("c1")).unwrap();
        let mut a = proxy("a", "alpha", "socks5");
        a.credential_id = Some("c1".into());
        insert(&conn, &a).unwrap();
        let mut b = proxy("b", "bravo", "http");
        b.enabled = false;
        insert(&conn, &b).unwrap();
        insert(&conn, &proxy("c", "charlie", "http")).unwrap();

        let names = |filter: ProxyFilter| -> Vec<String> {
            list(&conn, &filter)
                .unwrap()
                .into_iter()
                .map(|r| r.name)
                .collect()
        };

        assert_eq!(names(ProxyFilter::default()), vec!["alpha", "bravo", "charlie"]);
        assert_eq!(
            names(ProxyFilter {
                protocol: Some(ProxyProtocol::Http),
                ..Default::default()
            }),
            vec!["bravo", "charlie"]
        );
        assert_eq!(
            names(ProxyFilter {
                enabled: Some(false),
                ..Default::default()
            }),
            vec!["bravo"]
        );
        assert_eq!(
            names(ProxyFilter {
                has_credentials: Some(true),
                ..Default::default()
            }),
            vec!["alpha"]
        );
        assert_eq!(
            names(ProxyFilter {
                protocol: Some(ProxyProtocol::Http),
                enabled: Some(true),
                has_credentials: Some(false),
            }),
            vec!["charlie"]
        );
    }

    #[test]
    fn plaintext_scan_and_clear() {
        let conn = test_support::conn();
        let mut legacy = proxy("b", "legacy", "http");
        legacy.username = Some("u".into());
        legacy.password = Some("p".into());
        insert(&conn, &legacy).unwrap();
        let mut blank = proxy("a", "blank", "http");
        blank.username = Some(String::new());
        insert(&conn, &blank).unwrap();

        assert_eq!(count_plaintext(&conn).unwrap(), 1);
        assert_eq!(list_plaintext(&conn).unwrap()[0].id, "b");

        credentials::insert(&conn, &credential("c1")).unwrap();
        assert_eq!(link_and_clear_plaintext(&conn, "b", "c1", "t2").unwrap(), 1);
        let row = get(&conn, "b").unwrap().unwrap();
        assert_eq!(row.username, None);
        assert_eq!(row.password, None);
        assert_eq!(row.credential_id.as_deref(), Some("c1"));
        assert_eq!(count_plaintext(&conn).unwrap(), 0);
    }

    #[test]
    fn update_details_leaves_legacy_columns() {
        let conn = test_support::conn();
        let mut row = proxy("a", "alpha", "http");
        row.password = Some("legacy".into());
        insert(&conn, &row).unwrap();

        row.host = "example.net".into();
        row.password = None;
        assert_eq!(update_details(&conn, &row).unwrap(), 1);

        let stored = get(&conn, "a").unwrap().unwrap();
        assert_eq!(stored.host, "example.net");
        assert_eq!(stored.password.as_deref(), Some("legacy"));
    }

    #[test]
    fn dangling_credential_reference_fails_at_commit() {
        let mut conn = test_support::conn();
        let tx = conn.transaction().unwrap();
        let mut row = proxy("a", "alpha", "http");
        row.credential_id = Some("missing".into());
        insert(&tx, &row).unwrap();
        assert!(tx.commit().is_err());
    }
}
