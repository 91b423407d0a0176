//! Well-known storage keys.

/// User-only log.
pub const QUESTIONS: &str = "questions";
/// Interleaved user/assistant log.
pub const FULL_CONVERSATION: &str = "fullConversation";
/// Popup theme preference, owned by the settings surface.
pub const DARK_MODE: &str = "darkMode";

/// Keys holding transcript data; removing them is "clear all".
pub const TRANSCRIPT_KEYS: [&str; 2] = [QUESTIONS, FULL_CONVERSATION];
