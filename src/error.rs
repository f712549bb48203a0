//! Error types for clubhouse-link.

use std::time::Duration;

/// Error that stops the bot's run loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Errors raised by the remote voice-social platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Platform rejected {endpoint}: {reason}")]
    Rejected { endpoint: String, reason: String },

    #[error("Rate limited on {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },
}

/// Reasons a phone number is refused by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number must contain only digits after an optional leading '+'")]
    NotDigits,

    #[error("unknown country calling code")]
    UnknownCountryCode,

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("could not parse phone number: {0}")]
    Malformed(String),

    #[error("number is not valid for country code {country_code}")]
    NotValid { country_code: u16 },
}
