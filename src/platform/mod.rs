//! Remote voice-social platform: phone-number authentication and the
//! profile actions that follow a successful login.
//!
//! Calls that act on behalf of a user take explicit `PlatformCredentials`.
//! There is no shared logged-in client: every authenticated call carries the
//! credentials it was given, so concurrent users never see each other's
//! tokens.

pub mod clubhouse;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::PlatformError;

pub use clubhouse::ClubhouseClient;

/// The remote account a handshake logged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub user_id: String,
    pub username: Option<String>,
}

/// Credentials for acting as one remote user.
#[derive(Debug)]
pub struct PlatformCredentials {
    pub user_id: String,
    pub auth_token: SecretString,
}

impl PlatformCredentials {
    pub fn new(user_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_token: SecretString::from(auth_token.into()),
        }
    }
}

/// Outcome of `complete_phone_auth`.
#[derive(Debug)]
pub struct AuthHandshakeResult {
    pub success: bool,
    pub auth_token: Option<SecretString>,
    pub user_profile: Option<RemoteUser>,
}

impl AuthHandshakeResult {
    pub fn failed() -> Self {
        Self {
            success: false,
            auth_token: None,
            user_profile: None,
        }
    }

    pub fn succeeded(user: RemoteUser, auth_token: impl Into<String>) -> Self {
        Self {
            success: true,
            auth_token: Some(SecretString::from(auth_token.into())),
            user_profile: Some(user),
        }
    }

    /// Fresh credentials, only when the result is a consistent success.
    pub fn credentials(&self) -> Option<PlatformCredentials> {
        if !self.success {
            return None;
        }
        let user = self.user_profile.as_ref()?;
        let token = self.auth_token.as_ref()?;
        Some(PlatformCredentials::new(
            user.user_id.clone(),
            token.expose_secret().to_string(),
        ))
    }
}

/// Remote platform operations used by the onboarding flow.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Ask the platform to text a login code to `phone` (E.164).
    async fn begin_phone_auth(&self, phone: &str) -> Result<(), PlatformError>;

    /// Exchange the texted code for a session. Codes are single-use.
    async fn complete_phone_auth(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<AuthHandshakeResult, PlatformError>;

    /// Set the Instagram username shown on the remote profile.
    async fn update_instagram_username(
        &self,
        credentials: &PlatformCredentials,
        username: &str,
    ) -> Result<(), PlatformError>;

    /// Follow `target_user_id` as the credentialed user.
    async fn follow(
        &self,
        credentials: &PlatformCredentials,
        target_user_id: &str,
    ) -> Result<(), PlatformError>;
}
