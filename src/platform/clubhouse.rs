//! Clubhouse API client over reqwest.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AuthHandshakeResult, PlatformClient, PlatformCredentials, RemoteUser};
use crate::error::PlatformError;

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://www.clubhouseapi.com/api";

const APP_BUILD: &str = "304";
const APP_VERSION: &str = "0.1.28";
const APP_USER_AGENT: &str = "clubhouse/304 (iPhone; iOS 14.4; Scale/2.00)";

/// `source` value the app sends when following from a profile page.
const FOLLOW_SOURCE_PROFILE: u8 = 4;

/// Clubhouse client. Holds no user session; authenticated calls take
/// credentials explicitly.
pub struct ClubhouseClient {
    base_url: String,
    device_id: Uuid,
    client: reqwest::Client,
}

impl ClubhouseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device_id: Uuid::new_v4(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    /// Build a POST with the app-identification headers, plus the user's
    /// token when `credentials` is given.
    fn request(
        &self,
        endpoint: &str,
        credentials: Option<&PlatformCredentials>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(self.api_url(endpoint))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, APP_USER_AGENT)
            .header("CH-AppBuild", APP_BUILD)
            .header("CH-AppVersion", APP_VERSION)
            .header("CH-Languages", "en-US")
            .header("CH-Locale", "en_US")
            .header("CH-DeviceId", self.device_id.to_string().to_uppercase());

        if let Some(creds) = credentials {
            builder = builder
                .header(
                    AUTHORIZATION,
                    format!("Token {}", creds.auth_token.expose_secret()),
                )
                .header("CH-UserID", creds.user_id.as_str());
        }
        builder
    }

    /// POST a JSON body and return the decoded JSON response.
    async fn post(
        &self,
        endpoint: &str,
        body: Value,
        credentials: Option<&PlatformCredentials>,
    ) -> Result<Value, PlatformError> {
        let resp = self
            .request(endpoint, credentials)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PlatformError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PlatformError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| PlatformError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// POST and require `"success": true` in the response.
    async fn post_expecting_success(
        &self,
        endpoint: &str,
        body: Value,
        credentials: Option<&PlatformCredentials>,
    ) -> Result<(), PlatformError> {
        let data = self.post(endpoint, body, credentials).await?;
        if data.get("success").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            Err(PlatformError::Rejected {
                endpoint: endpoint.to_string(),
                reason: error_message(&data),
            })
        }
    }
}

#[async_trait]
impl PlatformClient for ClubhouseClient {
    async fn begin_phone_auth(&self, phone: &str) -> Result<(), PlatformError> {
        tracing::debug!(phone, "Starting phone number auth");
        self.post_expecting_success(
            "start_phone_number_auth",
            json!({ "phone_number": phone }),
            None,
        )
        .await
    }

    async fn complete_phone_auth(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<AuthHandshakeResult, PlatformError> {
        let data = self
            .post(
                "complete_phone_number_auth",
                json!({ "phone_number": phone, "verification_code": code }),
                None,
            )
            .await?;
        Ok(parse_handshake(&data))
    }

    async fn update_instagram_username(
        &self,
        credentials: &PlatformCredentials,
        username: &str,
    ) -> Result<(), PlatformError> {
        self.post_expecting_success(
            "update_instagram_username",
            json!({ "username": username }),
            Some(credentials),
        )
        .await
    }

    async fn follow(
        &self,
        credentials: &PlatformCredentials,
        target_user_id: &str,
    ) -> Result<(), PlatformError> {
        // The API expects a numeric id when there is one.
        let user_id = target_user_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(target_user_id));
        self.post_expecting_success(
            "follow",
            json!({
                "source_topic_id": null,
                "user_ids": null,
                "user_id": user_id,
                "source": FOLLOW_SOURCE_PROFILE,
            }),
            Some(credentials),
        )
        .await
    }
}

/// Decode a `complete_phone_number_auth` response.
fn parse_handshake(data: &Value) -> AuthHandshakeResult {
    let success = data.get("success").and_then(Value::as_bool).unwrap_or(false);
    let auth_token = data
        .get("auth_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(|t| secrecy::SecretString::from(t.to_string()));
    let user_profile = data.get("user_profile").and_then(|p| {
        let user_id = match p.get("user_id")? {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s.clone(),
            _ => return None,
        };
        let username = p.get("username").and_then(Value::as_str).map(String::from);
        Some(RemoteUser { user_id, username })
    });

    AuthHandshakeResult {
        success,
        auth_token,
        user_profile,
    }
}

fn error_message(data: &Value) -> String {
    data.get("error_message")
        .and_then(Value::as_str)
        .unwrap_or("success flag not set")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_trims_trailing_slash() {
        let client = ClubhouseClient::new("http://localhost:9000/api/");
        assert_eq!(
            client.api_url("follow"),
            "http://localhost:9000/api/follow"
        );
    }

    #[test]
    fn anonymous_request_has_no_token() {
        let client = ClubhouseClient::new(DEFAULT_API_URL);
        let req = client.request("start_phone_number_auth", None).build().unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
        assert!(req.headers().get("CH-UserID").is_none());
        assert_eq!(req.headers().get("CH-AppBuild").unwrap(), APP_BUILD);
    }

    #[test]
    fn authenticated_request_uses_given_credentials() {
        let client = ClubhouseClient::new(DEFAULT_API_URL);
        let creds = PlatformCredentials::new("42", "fresh-token");
        let req = client.request("follow", Some(&creds)).build().unwrap();
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Token fresh-token");
        assert_eq!(req.headers().get("CH-UserID").unwrap(), "42");
    }

    #[test]
    fn device_id_is_stable_per_client() {
        let client = ClubhouseClient::new(DEFAULT_API_URL);
        let a = client.request("a", None).build().unwrap();
        let b = client.request("b", None).build().unwrap();
        assert_eq!(a.headers().get("CH-DeviceId"), b.headers().get("CH-DeviceId"));
    }

    #[test]
    fn parse_successful_handshake() {
        let data = json!({
            "success": true,
            "is_waitlisted": false,
            "auth_token": "tok",
            "user_profile": { "user_id": 1234, "username": "u1name" }
        });
        let result = parse_handshake(&data);
        assert!(result.success);
        let creds = result.credentials().unwrap();
        assert_eq!(creds.user_id, "1234");
        assert_eq!(
            result.user_profile.unwrap().username.as_deref(),
            Some("u1name")
        );
    }

    #[test]
    fn parse_failed_handshake() {
        let data = json!({ "success": false, "error_message": "Incorrect code" });
        let result = parse_handshake(&data);
        assert!(!result.success);
        assert!(result.user_profile.is_none());
        assert!(result.credentials().is_none());
    }

    #[test]
    fn parse_handshake_without_profile_is_inconsistent() {
        let data = json!({ "success": true, "auth_token": "tok" });
        let result = parse_handshake(&data);
        assert!(result.success);
        assert!(result.credentials().is_none());
    }

    #[test]
    fn error_message_fallback() {
        assert_eq!(error_message(&json!({})), "success flag not set");
        assert_eq!(
            error_message(&json!({ "error_message": "slow down" })),
            "slow down"
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_request_failure() {
        let client = ClubhouseClient::new("http://127.0.0.1:1");
        let err = client.begin_phone_auth("+989121234567").await.unwrap_err();
        assert!(matches!(err, PlatformError::RequestFailed { .. }), "got {err:?}");
    }
}
