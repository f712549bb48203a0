//! Events that drive the conversation state machine.

/// Reserved literals recognised in user text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commands {
    /// Entry command, e.g. `/start`.
    pub start: String,
    /// Cancel command, e.g. `/cancel`.
    pub cancel: String,
    /// Case-sensitive "done" literal that ends the conversation anywhere.
    pub done: String,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            start: "/start".to_string(),
            cancel: "/cancel".to_string(),
            done: "Done".to_string(),
        }
    }
}

impl Commands {
    /// Match a bot command: `/cmd`, `/cmd@BotName`, optionally followed by
    /// arguments.
    fn matches_command(text: &str, command: &str) -> bool {
        let Some(head) = text.split_whitespace().next() else {
            return false;
        };
        match head.strip_prefix(command) {
            Some("") => true,
            Some(rest) => rest.len() > 1 && rest.starts_with('@'),
            None => false,
        }
    }
}

/// How far the post-login profile actions got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Profile stored and every remote action succeeded.
    Linked,
    /// Profile stored but a remote action (username update or follow) failed.
    PartiallyLinked,
}

/// Input to `transition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ── From the user ───────────────────────────────────────────────
    Start,
    Cancel,
    Done,
    Text(String),

    // ── Fed back from remote calls ──────────────────────────────────
    PhoneAuthStarted,
    PhoneAuthFailed,
    HandshakeSucceeded { outcome: LinkOutcome },
    HandshakeFailed,
}

impl Event {
    /// Classify a chat message.
    pub fn from_text(text: &str, commands: &Commands) -> Event {
        if Commands::matches_command(text, &commands.start) {
            Event::Start
        } else if Commands::matches_command(text, &commands.cancel) {
            Event::Cancel
        } else if text == commands.done {
            Event::Done
        } else {
            Event::Text(text.to_string())
        }
    }

    /// Whether this event came from the remote platform rather than a user.
    pub fn is_feedback(&self) -> bool {
        matches!(
            self,
            Event::PhoneAuthStarted
                | Event::PhoneAuthFailed
                | Event::HandshakeSucceeded { .. }
                | Event::HandshakeFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Event {
        Event::from_text(text, &Commands::default())
    }

    #[test]
    fn recognises_commands() {
        assert_eq!(classify("/start"), Event::Start);
        assert_eq!(classify("/start@ClubhouseLinkBot"), Event::Start);
        assert_eq!(classify("/start promo"), Event::Start);
        assert_eq!(classify("/cancel"), Event::Cancel);
        assert_eq!(classify("Done"), Event::Done);
    }

    #[test]
    fn near_misses_are_plain_text() {
        for text in ["/starting", "/start@", "start", "done", "DONE", "Done ", " /cancelled"] {
            assert_eq!(classify(text), Event::Text(text.to_string()), "{text:?}");
        }
    }

    #[test]
    fn empty_text_is_text() {
        assert_eq!(classify(""), Event::Text(String::new()));
    }

    #[test]
    fn custom_literals() {
        let commands = Commands {
            start: "/link".into(),
            cancel: "/stop".into(),
            done: "Finish".into(),
        };
        assert_eq!(Event::from_text("/link", &commands), Event::Start);
        assert_eq!(Event::from_text("/stop", &commands), Event::Cancel);
        assert_eq!(Event::from_text("Finish", &commands), Event::Done);
        assert_eq!(
            Event::from_text("/start", &commands),
            Event::Text("/start".into())
        );
    }

    #[test]
    fn feedback_events() {
        assert!(Event::PhoneAuthStarted.is_feedback());
        assert!(Event::HandshakeFailed.is_feedback());
        assert!(!Event::Start.is_feedback());
        assert!(!Event::Text("x".into()).is_feedback());
    }
}
