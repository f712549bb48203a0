//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Menu keyboards are printed as numbered options; typing the number sends
//! the matching label. A menu answers one choice, like Telegram's one-time
//! keyboards, and any later reply without a menu takes it off screen.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, ChatUser, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;
use crate::prompts::Keyboard;

const CLI_USER_ID: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    /// Labels of the menu currently on screen.
    menu: Arc<Mutex<Vec<String>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            menu: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a numeric answer onto a menu label; anything else passes through.
fn resolve_menu_choice(line: &str, menu: &[String]) -> String {
    line.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| menu.get(i))
        .cloned()
        .unwrap_or_else(|| line.to_string())
}

/// Resolve `line` against the menu on screen, consuming the menu when a
/// label is picked.
fn take_menu_choice(line: &str, menu: &mut Vec<String>) -> String {
    let content = resolve_menu_choice(line, menu);
    if content != line {
        menu.clear();
    }
    content
}

fn render_menu(rows: &[Vec<String>]) -> (String, Vec<String>) {
    let labels: Vec<String> = rows.iter().flatten().cloned().collect();
    let rendered = labels
        .iter()
        .enumerate()
        .map(|(i, label)| format!("  [{}] {label}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    (rendered, labels)
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let menu = Arc::clone(&self.menu);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let content = match menu.lock() {
                            Ok(mut menu) => take_menu_choice(&line, &mut menu),
                            Err(_) => line,
                        };
                        let user = ChatUser::new(CLI_USER_ID).with_full_name("Local User");
                        let msg = IncomingMessage::new("cli", user, content);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}", response.content);
        if let Ok(mut menu) = self.menu.lock() {
            match &response.keyboard {
                Keyboard::Menu(rows) => {
                    let (rendered, labels) = render_menu(rows);
                    println!("{rendered}");
                    *menu = labels;
                }
                Keyboard::Remove | Keyboard::None => menu.clear(),
            }
        }
        println!();
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu() -> Vec<String> {
        vec!["Update Instagram account".into(), "About us".into()]
    }

    #[test]
    fn numeric_choice_picks_label() {
        assert_eq!(resolve_menu_choice("1", &menu()), "Update Instagram account");
        assert_eq!(resolve_menu_choice("2", &menu()), "About us");
    }

    #[test]
    fn out_of_range_choice_passes_through() {
        assert_eq!(resolve_menu_choice("0", &menu()), "0");
        assert_eq!(resolve_menu_choice("3", &menu()), "3");
        assert_eq!(resolve_menu_choice("09121234567", &[]), "09121234567");
    }

    #[test]
    fn menu_renders_numbered_rows() {
        let rows = vec![vec!["A".to_string()], vec!["B".to_string()]];
        let (rendered, labels) = render_menu(&rows);
        assert_eq!(rendered, "  [1] A\n  [2] B");
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn respond_tracks_current_menu() {
        let cli = CliChannel::new();
        let msg = IncomingMessage::new("cli", ChatUser::new(CLI_USER_ID), "/start");

        let response = OutgoingResponse {
            content: "Pick one".into(),
            keyboard: Keyboard::Menu(vec![vec!["A".into()], vec!["B".into()]]),
        };
        cli.respond(&msg, response).await.unwrap();
        assert_eq!(*cli.menu.lock().unwrap(), vec!["A", "B"]);

        let response = OutgoingResponse {
            content: "Bye".into(),
            keyboard: Keyboard::Remove,
        };
        cli.respond(&msg, response).await.unwrap();
        assert!(cli.menu.lock().unwrap().is_empty());
    }

    #[test]
    fn picking_a_label_consumes_the_menu() {
        let mut on_screen = menu();
        assert_eq!(take_menu_choice("1", &mut on_screen), "Update Instagram account");
        assert!(on_screen.is_empty());
        assert_eq!(take_menu_choice("1", &mut on_screen), "1");
    }

    #[test]
    fn free_text_leaves_the_menu_up() {
        let mut on_screen = menu();
        assert_eq!(take_menu_choice("hello", &mut on_screen), "hello");
        assert_eq!(on_screen, menu());
    }

    #[tokio::test]
    async fn plain_reply_takes_the_menu_down() {
        let cli = CliChannel::new();
        let msg = IncomingMessage::new("cli", ChatUser::new(CLI_USER_ID), "/start");

        let response = OutgoingResponse {
            content: "Welcome".into(),
            keyboard: Keyboard::Menu(vec![vec!["Update Instagram account".into()], vec!["About us".into()]]),
        };
        cli.respond(&msg, response).await.unwrap();

        let response = OutgoingResponse {
            content: "Now send your Instagram username.".into(),
            keyboard: Keyboard::None,
        };
        cli.respond(&msg, response).await.unwrap();

        let on_screen = cli.menu.lock().unwrap().clone();
        assert_eq!(resolve_menu_choice("2", &on_screen), "2");
    }
}
