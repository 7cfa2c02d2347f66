//! Core retrieval pipeline for the booru relay bot.
//!
//! This crate knows nothing about Telegram. The chat transport lives behind
//! [`messaging::port::MessagingPort`] and outbound HTTP behind
//! [`fetcher::HttpClient`], both implemented in adapter crates.

pub mod cache;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod fetcher;
pub mod limiter;
pub mod logging;
pub mod messaging;
pub mod provider;
pub mod query;
pub mod search;

pub use errors::{Error, Result};
