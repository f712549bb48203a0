//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, Profile, ProfileUpsert};

const PROFILE_COLUMNS: &str = "chat_user_id, chat_username, chat_name, remote_user_id, \
     remote_username, phone_number, auth_token, instagram_username, created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row (in `PROFILE_COLUMNS` order) to a Profile.
fn row_to_profile(row: &libsql::Row) -> Result<Profile, libsql::Error> {
    let token: String = row.get(6)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(Profile {
        chat_user_id: row.get(0)?,
        chat_username: row.get(1).ok(),
        chat_name: row.get(2)?,
        remote_user_id: row.get(3).ok(),
        remote_username: row.get(4).ok(),
        phone_number: row.get(5)?,
        auth_token: SecretString::from(token),
        instagram_username: row.get(7)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<Profile, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO profiles (chat_user_id, chat_username, chat_name, remote_user_id,
                remote_username, phone_number, auth_token, instagram_username,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT (chat_user_id) DO UPDATE SET
                chat_username = excluded.chat_username,
                chat_name = excluded.chat_name,
                remote_user_id = excluded.remote_user_id,
                remote_username = excluded.remote_username,
                phone_number = excluded.phone_number,
                auth_token = excluded.auth_token,
                instagram_username = excluded.instagram_username,
                updated_at = excluded.updated_at",
            params![
                profile.chat_user_id.as_str(),
                opt_text(profile.chat_username.as_deref()),
                profile.chat_name.as_str(),
                opt_text(profile.remote_user_id.as_deref()),
                opt_text(profile.remote_username.as_deref()),
                profile.phone_number.as_str(),
                profile.auth_token.expose_secret(),
                profile.instagram_username.as_str(),
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        debug!(chat_user_id = %profile.chat_user_id, "Profile upserted");

        self.get_profile(&profile.chat_user_id)
            .await?
            .ok_or_else(|| DatabaseError::Query("upsert_profile: row missing after write".into()))
    }

    async fn get_profile(&self, chat_user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE chat_user_id = ?1"),
                params![chat_user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_profile(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("get_profile: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn count_profiles(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM profiles", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_profiles: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_profiles: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_profiles: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_upsert(chat_user_id: &str, instagram: &str) -> ProfileUpsert {
        ProfileUpsert {
            chat_user_id: chat_user_id.into(),
            chat_username: Some("alice".into()),
            chat_name: "@alice".into(),
            remote_user_id: Some("u1".into()),
            remote_username: Some("u1name".into()),
            phone_number: "+989121234567".into(),
            auth_token: SecretString::from("tok-1".to_string()),
            instagram_username: instagram.into(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_new_profile() {
        let db = test_db().await;
        let profile = db.upsert_profile(&make_upsert("100", "myhandle")).await.unwrap();

        assert_eq!(profile.chat_user_id, "100");
        assert_eq!(profile.chat_username.as_deref(), Some("alice"));
        assert_eq!(profile.remote_user_id.as_deref(), Some("u1"));
        assert_eq!(profile.phone_number, "+989121234567");
        assert_eq!(profile.auth_token.expose_secret(), "tok-1");
        assert_eq!(profile.instagram_username, "myhandle");
        assert_eq!(profile.created_at, profile.updated_at);
        assert_eq!(db.count_profiles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_all_fields_and_keeps_created_at() {
        let db = test_db().await;
        let first = db.upsert_profile(&make_upsert("100", "old")).await.unwrap();

        let mut second = make_upsert("100", "new");
        second.chat_username = None;
        second.remote_user_id = None;
        second.remote_username = None;
        second.phone_number = "+989350000000".into();
        second.auth_token = SecretString::from("tok-2".to_string());
        let updated = db.upsert_profile(&second).await.unwrap();

        assert_eq!(db.count_profiles().await.unwrap(), 1);
        assert_eq!(updated.instagram_username, "new");
        assert_eq!(updated.chat_username, None);
        assert_eq!(updated.remote_user_id, None);
        assert_eq!(updated.remote_username, None);
        assert_eq!(updated.phone_number, "+989350000000");
        assert_eq!(updated.auth_token.expose_secret(), "tok-2");
        assert_eq!(updated.created_at, first.created_at);
        assert!(updated.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn distinct_users_get_distinct_rows() {
        let db = test_db().await;
        db.upsert_profile(&make_upsert("100", "a")).await.unwrap();
        db.upsert_profile(&make_upsert("200", "b")).await.unwrap();

        assert_eq!(db.count_profiles().await.unwrap(), 2);
        let b = db.get_profile("200").await.unwrap().unwrap();
        assert_eq!(b.instagram_username, "b");
    }

    #[tokio::test]
    async fn get_profile_not_found() {
        let db = test_db().await;
        assert!(db.get_profile("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("profiles.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_profile(&make_upsert("100", "myhandle")).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let profile = db.get_profile("100").await.unwrap().unwrap();
        assert_eq!(profile.instagram_username, "myhandle");
    }

    #[test]
    fn parse_datetime_formats() {
        let rfc = parse_datetime("2024-03-01T10:00:00+00:00");
        let sqlite = parse_datetime("2024-03-01 10:00:00");
        assert_eq!(rfc, sqlite);
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }
}
