//! The pure transition function: `(session, event) -> (next state, effects)`.
//!
//! Nothing here performs I/O. Remote calls are requested as effects, and
//! their outcomes come back as feedback events (`PhoneAuthStarted`,
//! `HandshakeSucceeded`, ...) that are fed through `transition` again.

use crate::phone::{self, Region};
use crate::prompts::Prompt;

use super::event::{Event, LinkOutcome};
use super::state::{ConversationSession, ConversationState, PendingField};

/// Side effect requested by a transition, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Forget everything collected so far.
    Reset,
    /// Send a prompt to the user.
    Reply(Prompt),
    /// Store a value in the session's pending data.
    Remember { field: PendingField, value: String },
    /// Ask the platform to text a login code. Answers with
    /// `PhoneAuthStarted` or `PhoneAuthFailed`.
    BeginPhoneAuth { phone: String },
    /// Run the login handshake and the profile actions after it. Answers with
    /// `HandshakeSucceeded` or `HandshakeFailed`.
    CompleteHandshake {
        phone: String,
        instagram_username: String,
        code: String,
    },
}

impl Effect {
    pub fn is_remote(&self) -> bool {
        matches!(self, Effect::BeginPhoneAuth { .. } | Effect::CompleteHandshake { .. })
    }
}

/// Result of a matched event. A transition carries at most one remote
/// effect, always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: ConversationState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Inputs the transition function needs besides the session.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub region: Region,
    pub update_account_label: &'a str,
    pub about_us_label: &'a str,
}

fn ask_for_phone() -> Vec<Effect> {
    vec![
        Effect::Reply(Prompt::EnterPhoneNumber),
        Effect::Reply(Prompt::PriceNotice),
    ]
}

/// Decide what `event` does to `session`. `None` means the input is not
/// handled in this state: no reply, session unchanged.
pub fn transition(
    session: &ConversationSession,
    event: Event,
    ctx: &TransitionContext<'_>,
) -> Option<Transition> {
    use ConversationState::*;

    let state = session.state;
    let transition = match (state, event) {
        // The entry command restarts from any state.
        (_, Event::Start) => Transition::to(
            Choosing,
            vec![Effect::Reset, Effect::Reply(Prompt::Welcome)],
        ),

        (Idle, Event::Text(text)) if text == ctx.update_account_label => {
            let mut effects = vec![Effect::Reset];
            effects.extend(ask_for_phone());
            Transition::to(AwaitingPhone, effects)
        }
        (Idle, _) => return None,

        (_, Event::Done) => Transition::to(Ended, vec![Effect::Reply(Prompt::Done)]),

        (s, Event::Cancel) if s.accepts_cancel() => {
            Transition::to(Cancelled, vec![Effect::Reply(Prompt::Cancelled)])
        }

        (Choosing, Event::Text(text)) if text == ctx.update_account_label => {
            Transition::to(AwaitingPhone, ask_for_phone())
        }
        (Choosing, Event::Text(text)) if text == ctx.about_us_label => {
            Transition::to(Ended, vec![Effect::Reply(Prompt::AboutUs)])
        }

        (AwaitingPhone, Event::Text(text)) => match phone::normalize(&text, ctx.region) {
            Ok(canonical) => {
                let phone = canonical.into_string();
                Transition::to(
                    AwaitingPhone,
                    vec![
                        Effect::Remember {
                            field: PendingField::PhoneNumber,
                            value: phone.clone(),
                        },
                        Effect::BeginPhoneAuth { phone },
                    ],
                )
            }
            Err(_) => Transition::to(
                AwaitingPhone,
                vec![
                    Effect::Reply(Prompt::InvalidPhoneNumber),
                    Effect::Reply(Prompt::EnterPhoneNumber),
                ],
            ),
        },
        (AwaitingPhone, Event::PhoneAuthStarted) => Transition::to(
            AwaitingInstagramHandle,
            vec![Effect::Reply(Prompt::EnterInstagramUsername)],
        ),
        (AwaitingPhone, Event::PhoneAuthFailed) => {
            Transition::to(Ended, vec![Effect::Reply(Prompt::PhoneAuthFailed)])
        }

        // Any text is accepted as the handle, including an empty one.
        (AwaitingInstagramHandle, Event::Text(handle)) => Transition::to(
            AwaitingVerificationCode,
            vec![
                Effect::Remember {
                    field: PendingField::InstagramUsername,
                    value: handle,
                },
                Effect::Reply(Prompt::EnterVerificationCode),
            ],
        ),

        (AwaitingVerificationCode, Event::Text(code)) => {
            let phone = session.pending.get(PendingField::PhoneNumber);
            let handle = session.pending.get(PendingField::InstagramUsername);
            match (phone, handle) {
                (Some(phone), Some(handle)) => Transition::to(
                    AwaitingVerificationCode,
                    vec![Effect::CompleteHandshake {
                        phone: phone.to_string(),
                        instagram_username: handle.to_string(),
                        code,
                    }],
                ),
                _ => Transition::to(Ended, vec![Effect::Reply(Prompt::LinkFailed)]),
            }
        }
        (AwaitingVerificationCode, Event::HandshakeSucceeded { outcome }) => {
            let prompt = match outcome {
                LinkOutcome::Linked => Prompt::LinkSucceeded,
                LinkOutcome::PartiallyLinked => Prompt::LinkPartiallySucceeded,
            };
            Transition::to(Completed, vec![Effect::Reply(prompt)])
        }
        (AwaitingVerificationCode, Event::HandshakeFailed) => {
            Transition::to(Ended, vec![Effect::Reply(Prompt::LinkFailed)])
        }

        _ => return None,
    };

    Some(transition)
}
