//! Clubhouse Link: a chat bot that links a Telegram user to their Clubhouse
//! account and puts their Instagram handle on the Clubhouse profile.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod phone;
pub mod platform;
pub mod prompts;
pub mod store;
