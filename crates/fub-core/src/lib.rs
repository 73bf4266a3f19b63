//! Core domain + application logic for the file upload bot.
//!
//! This crate is framework-agnostic. Telegram and the file hosts live behind
//! ports (traits) implemented in adapter crates.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod notify;
pub mod pipeline;
pub mod ports;
pub mod relay;
pub mod security;
pub mod texts;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use errors::{Error, Result, UploadError};
