//! Chatlog Core: error type, capture configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{CaptureConfig, DataPaths, Selectors};
pub use error::{Error, Result};
