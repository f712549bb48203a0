//! The linking conversation: a pure state machine plus the manager that
//! runs it per user.

pub mod event;
pub mod manager;
pub mod state;
pub mod transition;

pub use event::{Commands, Event, LinkOutcome};
pub use manager::{ConversationManager, spawn_prune_task};
pub use state::{ConversationSession, ConversationState, PendingData, PendingField};
pub use transition::{Effect, Transition, TransitionContext, transition};
