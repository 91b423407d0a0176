//! User-turn capture.
//!
//! Three signals can finalize a user turn: the confirm key (which only
//! snapshots the text), the input surface becoming empty, and the settled
//! read after a form submission. Pending input is the single source of
//! truth; whichever signal first finds text takes it and clears the slot,
//! so later signals for the same turn are no-ops.

use tracing::debug;

/// Key that commits the composer when pressed without Shift.
pub const CONFIRM_KEY: &str = "Enter";

#[derive(Debug, Default)]
pub struct UserTurnCapture {
    pending: String,
}

impl UserTurnCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the surface text on a commit gesture, before the page
    /// clears it. Returns whether the key was a commit.
    pub fn on_key_down(&mut self, key: &str, shift: bool, surface_text: &str) -> bool {
        if key != CONFIRM_KEY || shift {
            return false;
        }
        self.pending = surface_text.trim().to_string();
        debug!("Pending input set ({} chars)", self.pending.len());
        true
    }

    /// The surface changed. An empty surface with pending text means the
    /// submission went through.
    pub fn on_input_mutation(&mut self, surface_text: &str) -> Option<String> {
        if !surface_text.trim().is_empty() || self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Deferred read after a form submission: prefer what is still in the
    /// surface, fall back to the pending snapshot.
    pub fn on_submit_settled(&mut self, surface_text: &str) -> Option<String> {
        let current = surface_text.trim();
        let text = if current.is_empty() {
            std::mem::take(&mut self.pending)
        } else {
            self.pending.clear();
            current.to_string()
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn pending(&self) -> Option<&str> {
        (!self.pending.is_empty()).then_some(self.pending.as_str())
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
