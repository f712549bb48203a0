//! `Database` trait: the identity store the onboarding flow writes to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::error::DatabaseError;

/// Durable link between a chat user and a remote platform account.
///
/// Keyed by `chat_user_id`. Written only when a handshake completes.
#[derive(Debug)]
pub struct Profile {
    pub chat_user_id: String,
    pub chat_username: Option<String>,
    pub chat_name: String,
    pub remote_user_id: Option<String>,
    pub remote_username: Option<String>,
    /// E.164 phone number.
    pub phone_number: String,
    pub auth_token: SecretString,
    pub instagram_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Non-key-generated fields of a `Profile`, as written by an upsert.
#[derive(Debug)]
pub struct ProfileUpsert {
    pub chat_user_id: String,
    pub chat_username: Option<String>,
    pub chat_name: String,
    pub remote_user_id: Option<String>,
    pub remote_username: Option<String>,
    pub phone_number: String,
    pub auth_token: SecretString,
    pub instagram_username: String,
}

/// Backend-agnostic persistence for profiles.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Create or replace the profile for `profile.chat_user_id`.
    ///
    /// Every non-key field is overwritten; `created_at` survives.
    async fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<Profile, DatabaseError>;

    /// Look up a profile by chat user id.
    async fn get_profile(&self, chat_user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    /// Number of stored profiles.
    async fn count_profiles(&self) -> Result<u64, DatabaseError>;
}
