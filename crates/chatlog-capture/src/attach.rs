//! Attachment controller: binds capture to the live page elements.
//!
//! The composer mounts late and single-page navigation swaps elements out,
//! so binding is retried on a fixed interval and re-attempted on every
//! structural change. An explicit registry of element → surface makes
//! repeated attempts cheap no-ops and lets the session route events only
//! from bound elements.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::debounce::Debounce;
use crate::page::{ElementId, Page};
use crate::session::SessionInput;
use chatlog_core::Selectors;

/// A page surface the capture core binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// The editable composer.
    Input,
    /// The form enclosing the composer.
    Form,
    /// The region hosting the streamed response.
    Output,
}

#[derive(Debug)]
pub struct AttachmentController {
    selectors: Selectors,
    registry: HashMap<ElementId, Surface>,
    input_retry: Debounce,
    output_retry: Debounce,
}

impl AttachmentController {
    pub fn new(selectors: Selectors, retry_interval: Duration) -> Self {
        Self {
            selectors,
            registry: HashMap::new(),
            input_retry: Debounce::new(retry_interval),
            output_retry: Debounce::new(retry_interval),
        }
    }

    /// Locate and bind the composer and its form. Returns `false` when the
    /// composer is not mounted yet. A missing form is tolerated.
    pub fn attach_listeners(&mut self, page: &dyn Page) -> bool {
        let Some(input) = page.query(&self.selectors.input) else {
            debug!("Input box not found ({})", self.selectors.input);
            self.unbind(Surface::Input);
            self.unbind(Surface::Form);
            return false;
        };
        self.bind(input, Surface::Input);
        match page.query(&self.selectors.form) {
            Some(form) => {
                self.bind(form, Surface::Form);
            }
            None => self.unbind(Surface::Form),
        }
        self.input_retry.cancel();
        true
    }

    /// Locate and bind the response region. Returns `false` when absent.
    pub fn attach_output(&mut self, page: &dyn Page) -> bool {
        let Some(output) = page.query(&self.selectors.output) else {
            debug!("Conversation container not found ({})", self.selectors.output);
            self.unbind(Surface::Output);
            return false;
        };
        self.bind(output, Surface::Output);
        self.output_retry.cancel();
        true
    }

    /// Try again after the retry interval. A retry already waiting is replaced.
    pub fn schedule_retry(&mut self, surface: Surface, tx: &mpsc::UnboundedSender<SessionInput>) {
        let slot = match surface {
            Surface::Output => &mut self.output_retry,
            Surface::Input | Surface::Form => &mut self.input_retry,
        };
        slot.schedule(tx, move |generation| SessionInput::Retry {
            surface,
            generation,
        });
    }

    /// Consume a retry expiry. `true` when the attempt should run.
    pub fn on_retry(&mut self, surface: Surface, generation: u64) -> bool {
        match surface {
            Surface::Output => self.output_retry.fire(generation),
            Surface::Input | Surface::Form => self.input_retry.fire(generation),
        }
    }

    /// Surface an element is bound as, if any.
    pub fn surface_of(&self, element: ElementId) -> Option<Surface> {
        self.registry.get(&element).copied()
    }

    /// Element currently bound as `surface`.
    pub fn bound(&self, surface: Surface) -> Option<ElementId> {
        self.registry
            .iter()
            .find(|(_, s)| **s == surface)
            .map(|(id, _)| *id)
    }

    fn bind(&mut self, element: ElementId, surface: Surface) -> bool {
        if self.registry.get(&element) == Some(&surface) {
            return false;
        }
        // A surface has one live element; a replacement takes over the slot.
        self.registry.retain(|_, s| *s != surface);
        self.registry.insert(element, surface);
        info!("Attached {:?} listener to element {}", surface, element);
        true
    }

    /// Forget the element bound as `surface`; it is gone from the page.
    fn unbind(&mut self, surface: Surface) {
        if let Some(element) = self.bound(surface) {
            self.registry.remove(&element);
            info!("Detached {:?} listener from element {}", surface, element);
        }
    }
}
