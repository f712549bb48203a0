//! Conversation manager: owns per-user sessions and runs the effects the
//! transition function asks for.
//!
//! Steps for one user are serialized by that user's session mutex; different
//! users proceed concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::channels::ChatUser;
use crate::config::FlowConfig;
use crate::error::PlatformError;
use crate::platform::PlatformClient;
use crate::prompts::{PromptCatalog, Reply};
use crate::store::{Database, ProfileUpsert};

use super::event::{Event, LinkOutcome};
use super::state::{ConversationSession, ConversationState, PendingData};
use super::transition::{Effect, Transition, TransitionContext, transition};

type SessionSlot = Arc<Mutex<ConversationSession>>;

/// Routes chat messages through the linking conversation.
pub struct ConversationManager {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    platform: Arc<dyn PlatformClient>,
    db: Arc<dyn Database>,
    prompts: Arc<dyn PromptCatalog>,
    config: FlowConfig,
}

impl ConversationManager {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        db: Arc<dyn Database>,
        prompts: Arc<dyn PromptCatalog>,
        config: FlowConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            platform,
            db,
            prompts,
            config,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Process one chat message and return the replies to send, in order.
    /// Unmatched input yields no replies.
    pub async fn handle(&self, user: &ChatUser, text: &str) -> Vec<Reply> {
        let event = Event::from_text(text, &self.config.commands);
        let (slot, mut session) = self.lock_session(&user.id).await;

        let replies = self.run(user, &mut session, event).await;
        session.touch();

        if session.state.is_terminal() || session.state == ConversationState::Idle {
            session.reset();
            self.discard(&user.id, &slot).await;
        }

        replies
    }

    /// Current state for a user; `Idle` when they have no session.
    pub async fn session_state(&self, user_id: &str) -> ConversationState {
        let slot = self.sessions.read().await.get(user_id).cloned();
        match slot {
            Some(slot) => slot.lock().await.state,
            None => ConversationState::Idle,
        }
    }

    /// Number of users with a conversation in progress.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least `max_idle`. Sessions busy with a
    /// message are left alone. Returns how many were dropped.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user_id, slot| match slot.try_lock() {
            Ok(session) if session.last_activity <= cutoff => {
                debug!(user_id = %user_id, state = %session.state, "Dropping idle conversation");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    /// Get (or open) the user's session and lock it. Retries if the slot was
    /// discarded while we waited for its lock.
    async fn lock_session(&self, user_id: &str) -> (SessionSlot, OwnedMutexGuard<ConversationSession>) {
        loop {
            let slot = {
                let mut sessions = self.sessions.write().await;
                Arc::clone(sessions.entry(user_id.to_string()).or_default())
            };
            let guard = Arc::clone(&slot).lock_owned().await;

            let current = self
                .sessions
                .read()
                .await
                .get(user_id)
                .is_some_and(|s| Arc::ptr_eq(s, &slot));
            if current {
                return (slot, guard);
            }
        }
    }

    async fn discard(&self, user_id: &str, slot: &SessionSlot) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(user_id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            sessions.remove(user_id);
        }
    }

    /// Feed `event` through the state machine, executing effects, until no
    /// remote outcome is pending.
    async fn run(
        &self,
        user: &ChatUser,
        session: &mut ConversationSession,
        event: Event,
    ) -> Vec<Reply> {
        let ctx = TransitionContext {
            region: self.config.region,
            update_account_label: self.prompts.update_account_label(),
            about_us_label: self.prompts.about_us_label(),
        };

        let mut replies = Vec::new();
        let mut next_event = Some(event);

        while let Some(event) = next_event.take() {
            let feedback = event.is_feedback();
            let Some(Transition { next, effects }) = transition(session, event, &ctx) else {
                if feedback {
                    warn!(user_id = %user.id, state = %session.state, "Remote outcome arrived in unexpected state");
                } else {
                    debug!(user_id = %user.id, state = %session.state, "Input not handled in this state");
                }
                break;
            };

            let from = session.state;
            session.state = next;
            if from != next {
                info!(user_id = %user.id, from = %from, to = %next, "Conversation transition");
            }

            for effect in effects {
                match effect {
                    Effect::Reset => session.pending = PendingData::default(),
                    Effect::Reply(prompt) => replies.push(self.prompts.render(prompt)),
                    Effect::Remember { field, value } => session.pending.set(field, value),
                    Effect::BeginPhoneAuth { phone } => {
                        next_event = Some(self.begin_phone_auth(user, &phone).await);
                    }
                    Effect::CompleteHandshake {
                        phone,
                        instagram_username,
                        code,
                    } => {
                        next_event = Some(
                            self.complete_handshake(user, &phone, &instagram_username, &code)
                                .await,
                        );
                    }
                }
            }
        }

        replies
    }

    /// Run a platform call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, PlatformError> {
        let timeout = self.config.remote_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(PlatformError::Timeout {
                    operation: operation.to_string(),
                    timeout,
                })
            })
    }

    async fn begin_phone_auth(&self, user: &ChatUser, phone: &str) -> Event {
        match self
            .bounded("begin_phone_auth", self.platform.begin_phone_auth(phone))
            .await
        {
            Ok(()) => {
                info!(user_id = %user.id, "Login code requested");
                Event::PhoneAuthStarted
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Could not request login code");
                Event::PhoneAuthFailed
            }
        }
    }

    /// Log in with the code, record the profile, then apply the profile
    /// actions with the fresh credentials.
    async fn complete_handshake(
        &self,
        user: &ChatUser,
        phone: &str,
        instagram_username: &str,
        code: &str,
    ) -> Event {
        let result = match self
            .bounded("complete_phone_auth", self.platform.complete_phone_auth(phone, code))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Login handshake failed");
                return Event::HandshakeFailed;
            }
        };

        // Only a successful, consistent handshake yields credentials; the
        // follow below is gated on that.
        let (Some(credentials), Some(remote)) = (result.credentials(), result.user_profile) else {
            info!(user_id = %user.id, "Login handshake rejected");
            return Event::HandshakeFailed;
        };

        let upsert = ProfileUpsert {
            chat_user_id: user.id.clone(),
            chat_username: user.username.clone(),
            chat_name: user.display_name(),
            remote_user_id: Some(remote.user_id),
            remote_username: remote.username,
            phone_number: phone.to_string(),
            auth_token: credentials.auth_token.expose_secret().to_string().into(),
            instagram_username: instagram_username.to_string(),
        };
        if let Err(e) = self.db.upsert_profile(&upsert).await {
            error!(user_id = %user.id, error = %e, "Failed to record linked profile");
            return Event::HandshakeFailed;
        }
        info!(user_id = %user.id, remote_user_id = %credentials.user_id, "Profile linked");

        let mut outcome = LinkOutcome::Linked;

        if let Err(e) = self
            .bounded(
                "update_instagram_username",
                self.platform
                    .update_instagram_username(&credentials, instagram_username),
            )
            .await
        {
            warn!(user_id = %user.id, error = %e, "Instagram username update failed");
            outcome = LinkOutcome::PartiallyLinked;
        }

        if let Err(e) = self
            .bounded(
                "follow",
                self.platform
                    .follow(&credentials, &self.config.follow_target_user_id),
            )
            .await
        {
            warn!(user_id = %user.id, error = %e, "Follow failed");
            outcome = LinkOutcome::PartiallyLinked;
        }

        Event::HandshakeSucceeded { outcome }
    }
}

/// Periodically drop sessions idle longer than the configured limit.
pub fn spawn_prune_task(manager: Arc<ConversationManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(manager.config.prune_interval);
        loop {
            interval.tick().await;
            let pruned = manager
                .prune_idle(manager.config.session_idle_timeout)
                .await;
            if pruned > 0 {
                info!(pruned, "Pruned idle conversations");
            }
        }
    })
}
