//! Telegram adapter.
//!
//! Talks to the Bot API directly: long-poll `getUpdates` in, multipart
//! requests out. Implements the core `MessagingPort` and drives the update
//! loop and command dispatch.

pub mod api;
pub mod client;
pub mod form;
pub mod handlers;
pub mod poller;
pub mod router;

pub use client::TelegramClient;
pub use router::run_polling;
