//! Capture core: reconstructs discrete chat messages from page observations.
//!
//! A companion extension forwards raw observations of the chat page
//! (keystrokes, input mutations, form submissions, inserted response
//! nodes). The session turns them into finalized, ordered user and
//! assistant messages and mirrors the transcript to the key-value store.

pub mod aggregator;
pub mod attach;
pub mod debounce;
pub mod message_store;
pub mod page;
pub mod session;
pub mod tags;
pub mod types;
pub mod user_turn;

pub use aggregator::{normalize_whitespace, AssistantAggregator};
pub use attach::{AttachmentController, Surface};
pub use debounce::Debounce;
pub use message_store::MessageStore;
pub use page::{AddedNode, ElementId, Page, PageEvent, RelayPage};
pub use session::{CaptureSession, SessionHandle, SessionInput};
pub use tags::extract_tags;
pub use types::*;
pub use user_turn::UserTurnCapture;
