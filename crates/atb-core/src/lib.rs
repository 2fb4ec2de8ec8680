//! Core dispatch and request-isolation logic for the Antares Telegram bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the GPT proxy
//! live behind ports (traits) implemented in adapter crates.

pub mod callback_data;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod event;
pub mod gate;
pub mod gpt;
pub mod handler;
pub mod logging;
pub mod modules;
pub mod ports;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
