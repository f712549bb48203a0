//! Configuration types.
//!
//! Everything is read from environment variables once at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::conversation::Commands;
use crate::error::ConfigError;
use crate::phone::Region;
use crate::platform::clubhouse::DEFAULT_API_URL;

/// Knobs of the linking conversation.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Region assumed for phone numbers typed without a country code.
    pub region: Region,
    /// Remote account every linked user follows.
    pub follow_target_user_id: String,
    /// Upper bound on each remote platform call.
    pub remote_timeout: Duration,
    /// Sessions idle longer than this are discarded.
    pub session_idle_timeout: Duration,
    /// How often idle sessions are swept.
    pub prune_interval: Duration,
    pub commands: Commands,
}

impl FlowConfig {
    pub fn new(follow_target_user_id: impl Into<String>) -> Self {
        Self {
            region: Region::default(),
            follow_target_user_id: follow_target_user_id.into(),
            remote_timeout: Duration::from_secs(30),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            prune_interval: Duration::from_secs(60),
            commands: Commands::default(),
        }
    }
}

/// Process configuration.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token. Without one the bot runs on the CLI channel.
    pub telegram_token: Option<SecretString>,
    /// Telegram usernames or numeric ids allowed to talk to the bot.
    pub allowed_users: Vec<String>,
    pub db_path: PathBuf,
    pub api_url: String,
    pub flow: FlowConfig,
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// when set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let follow_target = get("MY_CLUBHOUSE_USER_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("MY_CLUBHOUSE_USER_ID".into()))?;

        let mut flow = FlowConfig::new(follow_target.trim());

        if let Some(region) = get("CLUBHOUSE_LINK_REGION") {
            flow.region = region.parse::<Region>().map_err(|e| ConfigError::InvalidValue {
                key: "CLUBHOUSE_LINK_REGION".into(),
                message: format!("{e}"),
            })?;
        }
        if let Some(secs) = parse_secs(&get, "CLUBHOUSE_LINK_REMOTE_TIMEOUT_SECS")? {
            flow.remote_timeout = secs;
        }
        if let Some(secs) = parse_secs(&get, "CLUBHOUSE_LINK_SESSION_IDLE_SECS")? {
            flow.session_idle_timeout = secs;
        }

        let allowed_users = match get("TELEGRAM_ALLOWED_USERS") {
            Some(list) => list
                .split(',')
                .map(|u| u.trim().trim_start_matches('@').to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            None => vec!["*".to_string()],
        };

        Ok(Self {
            telegram_token: get("TELEGRAM_BOT_TOKEN").map(SecretString::from),
            allowed_users,
            db_path: get("CLUBHOUSE_LINK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/clubhouse-link.db")),
            api_url: get("CLUBHOUSE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            flow,
        })
    }
}

fn parse_secs(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be greater than zero".into(),
        }),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn follow_target_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "MY_CLUBHOUSE_USER_ID"));

        let err = load(&[("MY_CLUBHOUSE_USER_ID", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn defaults() {
        let config = load(&[("MY_CLUBHOUSE_USER_ID", "12345")]).unwrap();
        assert!(config.telegram_token.is_none());
        assert_eq!(config.allowed_users, vec!["*"]);
        assert_eq!(config.db_path, PathBuf::from("./data/clubhouse-link.db"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.flow.follow_target_user_id, "12345");
        assert_eq!(config.flow.region, Region::IR);
        assert_eq!(config.flow.remote_timeout, Duration::from_secs(30));
        assert_eq!(config.flow.session_idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.flow.commands, Commands::default());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("MY_CLUBHOUSE_USER_ID", "12345"),
            ("TELEGRAM_BOT_TOKEN", "123:ABC"),
            ("TELEGRAM_ALLOWED_USERS", "@alice, 42 ,,bob"),
            ("CLUBHOUSE_LINK_DB_PATH", "/tmp/x.db"),
            ("CLUBHOUSE_LINK_REGION", "us"),
            ("CLUBHOUSE_API_URL", "http://127.0.0.1:9000/api"),
            ("CLUBHOUSE_LINK_REMOTE_TIMEOUT_SECS", "5"),
            ("CLUBHOUSE_LINK_SESSION_IDLE_SECS", "600"),
        ])
        .unwrap();
        assert_eq!(config.telegram_token.unwrap().expose_secret(), "123:ABC");
        assert_eq!(config.allowed_users, vec!["alice", "42", "bob"]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.flow.region.code(), "US");
        assert_eq!(config.api_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.flow.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.flow.session_idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[
            ("MY_CLUBHOUSE_USER_ID", "1"),
            ("CLUBHOUSE_LINK_REMOTE_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CLUBHOUSE_LINK_REMOTE_TIMEOUT_SECS")
        );

        let err = load(&[
            ("MY_CLUBHOUSE_USER_ID", "1"),
            ("CLUBHOUSE_LINK_SESSION_IDLE_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = load(&[("MY_CLUBHOUSE_USER_ID", "1"), ("CLUBHOUSE_LINK_REGION", "XX")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CLUBHOUSE_LINK_REGION"));
    }
}
