//! # Sojourn Common Library
//!
//! Shared code for the Sojourn services including:
//! - Error types
//! - Bootstrap configuration loading and data folder resolution
//! - Calendar and clock utilities
//! - Event types (SojournEvent enum) and the EventBus
//! - SQLite initialization
//! - SSE stream helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
