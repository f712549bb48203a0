//! User-facing texts and reply keyboards.
//!
//! The conversation logic only names a `Prompt`; the wording comes from a
//! `PromptCatalog`, so deployments can swap languages without touching the
//! state machine.

use serde::{Deserialize, Serialize};

/// Every message the bot can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    Welcome,
    EnterPhoneNumber,
    PriceNotice,
    InvalidPhoneNumber,
    EnterInstagramUsername,
    EnterVerificationCode,
    LinkSucceeded,
    LinkPartiallySucceeded,
    LinkFailed,
    PhoneAuthFailed,
    AboutUs,
    Cancelled,
    Done,
}

/// Keyboard attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever keyboard the client shows.
    #[default]
    None,
    /// One-time reply keyboard, one button label per row entry.
    Menu(Vec<Vec<String>>),
    /// Remove the reply keyboard.
    Remove,
}

/// A rendered outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub prompt: Prompt,
    pub text: String,
    pub keyboard: Keyboard,
}

/// Lookup table for prompt wording and menu labels.
pub trait PromptCatalog: Send + Sync {
    fn text(&self, prompt: Prompt) -> String;

    /// Label of the "update instagram account" menu button.
    fn update_account_label(&self) -> &str;

    /// Label of the "about us" menu button.
    fn about_us_label(&self) -> &str;

    /// Main menu shown with the welcome text.
    fn main_menu(&self) -> Keyboard {
        Keyboard::Menu(vec![
            vec![self.update_account_label().to_string()],
            vec![self.about_us_label().to_string()],
        ])
    }

    /// Render a prompt with the keyboard it is always sent with.
    fn render(&self, prompt: Prompt) -> Reply {
        let keyboard = match prompt {
            Prompt::Welcome => self.main_menu(),
            Prompt::Cancelled | Prompt::Done => Keyboard::Remove,
            _ => Keyboard::None,
        };
        Reply {
            prompt,
            text: self.text(prompt),
            keyboard,
        }
    }
}

/// Built-in English wording.
#[derive(Debug, Clone)]
pub struct DefaultPrompts {
    update_account_label: String,
    about_us_label: String,
}

impl Default for DefaultPrompts {
    fn default() -> Self {
        Self {
            update_account_label: "Update Instagram account".to_string(),
            about_us_label: "About us".to_string(),
        }
    }
}

impl DefaultPrompts {
    /// Override the two menu labels (used for exact-match routing).
    pub fn with_labels(update_account: impl Into<String>, about_us: impl Into<String>) -> Self {
        Self {
            update_account_label: update_account.into(),
            about_us_label: about_us.into(),
        }
    }
}

impl PromptCatalog for DefaultPrompts {
    fn text(&self, prompt: Prompt) -> String {
        let text = match prompt {
            Prompt::Welcome => {
                "Hi! I can show your Instagram username on your Clubhouse profile. \
                 Pick an option below."
            }
            Prompt::EnterPhoneNumber => {
                "Send the phone number of your Clubhouse account, e.g. 09121234567."
            }
            Prompt::PriceNotice => {
                "Linking is free. Clubhouse will text you a login code for this step."
            }
            Prompt::InvalidPhoneNumber => "That doesn't look like a valid phone number.",
            Prompt::EnterInstagramUsername => "Now send your Instagram username.",
            Prompt::EnterVerificationCode => {
                "Send the verification code Clubhouse just texted you."
            }
            Prompt::LinkSucceeded => "Done! Your Instagram username is now on your Clubhouse profile.",
            Prompt::LinkPartiallySucceeded => {
                "Your account is linked, but Clubhouse did not accept every profile change. \
                 Send /start to try again later."
            }
            Prompt::LinkFailed => {
                "Clubhouse did not accept that code, so nothing was changed. \
                 Send /start to try again."
            }
            Prompt::PhoneAuthFailed => {
                "Clubhouse could not send a code to that number right now. \
                 Send /start to try again later."
            }
            Prompt::AboutUs => "We are a small team building tools for the Persian Clubhouse community.",
            Prompt::Cancelled => "Cancelled. Send /start whenever you want to begin again.",
            Prompt::Done => "See you soon! Send /start to begin again.",
        };
        text.to_string()
    }

    fn update_account_label(&self) -> &str {
        &self.update_account_label
    }

    fn about_us_label(&self) -> &str {
        &self.about_us_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_carries_main_menu() {
        let prompts = DefaultPrompts::default();
        let reply = prompts.render(Prompt::Welcome);
        assert_eq!(
            reply.keyboard,
            Keyboard::Menu(vec![
                vec!["Update Instagram account".to_string()],
                vec!["About us".to_string()],
            ])
        );
    }

    #[test]
    fn closing_prompts_remove_keyboard() {
        let prompts = DefaultPrompts::default();
        assert_eq!(prompts.render(Prompt::Cancelled).keyboard, Keyboard::Remove);
        assert_eq!(prompts.render(Prompt::Done).keyboard, Keyboard::Remove);
        assert_eq!(prompts.render(Prompt::EnterPhoneNumber).keyboard, Keyboard::None);
    }

    #[test]
    fn custom_labels_feed_the_menu() {
        let prompts = DefaultPrompts::with_labels("Link", "Info");
        assert_eq!(prompts.update_account_label(), "Link");
        assert_eq!(
            prompts.main_menu(),
            Keyboard::Menu(vec![vec!["Link".to_string()], vec!["Info".to_string()]])
        );
    }

    #[test]
    fn prompt_serializes_snake_case() {
        let json = serde_json::to_string(&Prompt::EnterVerificationCode).unwrap();
        assert_eq!(json, "\"enter_verification_code\"");
    }
}
