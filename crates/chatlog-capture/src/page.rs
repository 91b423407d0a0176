//! The page as the capture core sees it, and the relay wire protocol.
//!
//! The companion extension does not interpret anything: it resolves a few
//! selectors, forwards key presses, input mutations, submissions and
//! inserted nodes, and the core reads the page back through [`Page`].

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Opaque identity the extension assigns to a DOM element. A replaced
/// element gets a new id.
pub type ElementId = u64;

/// DOM `Node.ELEMENT_NODE`.
pub const ELEMENT_NODE: u16 = 1;
/// DOM `Node.TEXT_NODE`.
pub const TEXT_NODE: u16 = 3;

/// DOM capability the capture core reads through.
pub trait Page: Send + Sync {
    /// Resolve a selector against the current document.
    fn query(&self, selector: &str) -> Option<ElementId>;

    /// Visible text of an element, if it is known.
    fn inner_text(&self, element: ElementId) -> Option<String>;

    /// Called with each event just before the core handles it.
    fn observe(&self, _event: &PageEvent) {}
}

/// One observation forwarded by the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageEvent {
    /// The document structure changed; `elements` holds every selector
    /// that currently resolves.
    Structure {
        #[serde(default)]
        elements: HashMap<String, ElementId>,
    },
    /// A key press on `target`, with the element's text at that moment.
    #[serde(rename_all = "camelCase")]
    KeyDown {
        target: ElementId,
        key: String,
        #[serde(default)]
        shift_key: bool,
        #[serde(default)]
        text: String,
    },
    /// A mutation inside `target`, with its text afterwards.
    InputMutation {
        target: ElementId,
        #[serde(default)]
        text: String,
    },
    /// A submission of the form `target`.
    Submit { target: ElementId },
    /// A batch of nodes inserted somewhere under `root`.
    NodesAdded {
        root: ElementId,
        #[serde(default)]
        nodes: Vec<AddedNode>,
    },
}

/// A node reported by an insertion batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedNode {
    pub node_type: u16,
    /// `innerText` for elements, `textContent` for text nodes.
    #[serde(default)]
    pub text: Option<String>,
}

impl AddedNode {
    pub fn element(text: impl Into<String>) -> Self {
        Self {
            node_type: ELEMENT_NODE,
            text: Some(text.into()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            node_type: TEXT_NODE,
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Default)]
struct PageSnapshot {
    selectors: HashMap<String, ElementId>,
    texts: HashMap<ElementId, String>,
}

/// [`Page`] reconstructed from forwarded observations.
#[derive(Debug, Default)]
pub struct RelayPage {
    state: RwLock<PageSnapshot>,
}

impl RelayPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an observation into the snapshot.
    pub fn apply(&self, event: &PageEvent) {
        let mut state = self.state.write();
        match event {
            PageEvent::Structure { elements } => {
                state.selectors = elements.clone();
                state
                    .texts
                    .retain(|id, _| elements.values().any(|live| live == id));
            }
            PageEvent::KeyDown { target, text, .. } | PageEvent::InputMutation { target, text } => {
                state.texts.insert(*target, text.clone());
            }
            PageEvent::Submit { .. } | PageEvent::NodesAdded { .. } => {}
        }
    }
}

impl Page for RelayPage {
    fn query(&self, selector: &str) -> Option<ElementId> {
        self.state.read().selectors.get(selector).copied()
    }

    fn inner_text(&self, element: ElementId) -> Option<String> {
        self.state.read().texts.get(&element).cloned()
    }

    fn observe(&self, event: &PageEvent) {
        self.apply(event);
    }
}
