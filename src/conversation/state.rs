//! Conversation state: which step of the linking flow a user is in and
//! what they have typed so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Steps of the linking conversation.
///
/// Idle → Choosing → AwaitingPhone → AwaitingInstagramHandle →
/// AwaitingVerificationCode → Completed, with Cancelled and Ended as the
/// other ways out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Choosing,
    AwaitingPhone,
    AwaitingInstagramHandle,
    AwaitingVerificationCode,
    Completed,
    Cancelled,
    Ended,
}

impl ConversationState {
    /// Whether the session is discarded on reaching this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Ended)
    }

    /// Whether the cancel command applies here.
    pub fn accepts_cancel(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPhone | Self::AwaitingInstagramHandle | Self::AwaitingVerificationCode
        )
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Choosing => "choosing",
            Self::AwaitingPhone => "awaiting_phone",
            Self::AwaitingInstagramHandle => "awaiting_instagram_handle",
            Self::AwaitingVerificationCode => "awaiting_verification_code",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Ended => "ended",
        };
        write!(f, "{s}")
    }
}

/// Fields collected across steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingField {
    PhoneNumber,
    InstagramUsername,
}

/// User input gathered so far. The phone number is already canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_username: Option<String>,
}

impl PendingData {
    pub fn set(&mut self, field: PendingField, value: String) {
        match field {
            PendingField::PhoneNumber => self.phone_number = Some(value),
            PendingField::InstagramUsername => self.instagram_username = Some(value),
        }
    }

    pub fn get(&self, field: PendingField) -> Option<&str> {
        match field {
            PendingField::PhoneNumber => self.phone_number.as_deref(),
            PendingField::InstagramUsername => self.instagram_username.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none() && self.instagram_username.is_none()
    }
}

/// One user's in-flight conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub state: ConversationState,
    pub pending: PendingData,
    pub last_activity: DateTime<Utc>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self {
            state: ConversationState::Idle,
            pending: PendingData::default(),
            last_activity: Utc::now(),
        }
    }
}

impl ConversationSession {
    pub fn in_state(state: ConversationState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Drop collected data and return to Idle.
    pub fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.pending = PendingData::default();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
