// SPDX-FileCopyrightText: 2026 Proxyvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures that write and read rows behind the repository's back.

use proxyvault_core::types::{NewProxy, ProxyProtocol};
use proxyvault_core::ProxyVaultError;
use proxyvault_storage::queries::proxies;
use proxyvault_storage::{map_tr_err, now_timestamp, Database, ProxyRow};
use secrecy::SecretString;

/// Build a `NewProxy` for an HTTP proxy on `127.0.0.1:8080`.
pub fn new_proxy(name: &str, username: Option<&str>, password: Option<&str>) -> NewProxy {
    NewProxy {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port: 8080,
        protocol: ProxyProtocol::Http,
        enabled: true,
        username: username.map(|u| SecretString::from(u.to_string())),
        password: password.map(|p| SecretString::from(p.to_string())),
    }
}

/// A legacy proxy row with plaintext credentials and no linked record.
pub fn legacy_row(name: &str, username: Option<&str>, password: Option<&str>) -> ProxyRow {
    let now = now_timestamp();
    ProxyRow {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        host: "10.0.0.1".to_string(),
        port: 3128,
        protocol: "http".to_string(),
        enabled: true,
        username: username.map(str::to_string),
        password: password.map(str::to_string),
        credential_id: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Insert a legacy plaintext proxy row and return its id.
pub async fn insert_legacy_proxy(
    db: &Database,
    name: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<String, ProxyVaultError> {
    insert_raw_proxy(db, legacy_row(name, username, password)).await
}

/// Insert a proxy row exactly as given and return its id.
pub async fn insert_raw_proxy(db: &Database, row: ProxyRow) -> Result<String, ProxyVaultError> {
    let id = row.id.clone();
    db.connection()
        .call(move |conn| proxies::insert(conn, &row))
        .await
        .map_err(map_tr_err)?;
    Ok(id)
}

/// Read a proxy row including its legacy plaintext columns.
pub async fn raw_proxy(db: &Database, id: &str) -> Result<Option<ProxyRow>, ProxyVaultError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| proxies::get(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Row count of `table`.
pub async fn count_rows(db: &Database, table: &'static str) -> Result<u64, ProxyVaultError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Overwrite the stored password ciphertext of a credential record.
pub async fn corrupt_credential(db: &Database, credential_id: &str) -> Result<(), ProxyVaultError> {
    let id = credential_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE credentials SET encrypted_password = 'AAAA:AAAA:AAAA' WHERE id = ?1",
                [&id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(())
}
