//! Chatlog Store: key-value persistence with change notifications.
//!
//! The capture core mirrors its transcript here after every append and
//! listens for removals made by other actors (the "clear all" action).

pub mod file;
pub mod keys;
pub mod memory;
pub mod types;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use types::*;
