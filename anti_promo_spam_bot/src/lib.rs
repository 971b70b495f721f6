//! Source code for Anti Promo Spam Bot, a moderation bot for trading group chats.

/// Messages, entities and verdicts as seen by the spam checker.
pub mod types;

/// Candidate domains and the allow/deny list check.
pub mod domain;

/// Bot configuration and its hot-reloadable store.
pub mod config;

/// Spam checker functionality.
pub mod spam_checker;

/// Functions that perform stuff via the bot.
pub mod actions;

/// Miscellaneous functions.
mod misc;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
