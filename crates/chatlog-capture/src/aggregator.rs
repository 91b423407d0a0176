//! Assistant-turn aggregation.
//!
//! The response arrives as many small node insertions with no end-of-turn
//! marker. Fragments accumulate in a buffer and a quiescence timer is
//! restarted after every batch; only when the timer survives a full window
//! of silence is the buffer normalized and emitted as one message.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::debounce::Debounce;
use crate::page::{AddedNode, ELEMENT_NODE, TEXT_NODE};
use crate::session::SessionInput;

/// Trim and collapse every whitespace run to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
pub struct AssistantAggregator {
    buffer: String,
    noise_tokens: Vec<String>,
    quiet: Debounce,
}

impl AssistantAggregator {
    pub fn new(quiescence: Duration, noise_tokens: Vec<String>) -> Self {
        Self {
            buffer: String::new(),
            noise_tokens,
            quiet: Debounce::new(quiescence),
        }
    }

    /// Fold a batch of inserted nodes into the buffer. Returns how many
    /// nodes contributed text.
    ///
    /// Elements contribute their trimmed text plus a separating space.
    /// Text nodes are streamed fragments and are kept verbatim so that
    /// split words join back up.
    pub fn ingest(&mut self, nodes: &[AddedNode]) -> usize {
        let mut accepted = 0;
        for node in nodes {
            let raw = node.text.as_deref().unwrap_or("");
            let trimmed = raw.trim();
            if trimmed.is_empty() || self.is_noise(trimmed) {
                continue;
            }
            match node.node_type {
                ELEMENT_NODE => {
                    self.buffer.push_str(trimmed);
                    self.buffer.push(' ');
                }
                TEXT_NODE => self.buffer.push_str(raw),
                _ => continue,
            }
            accepted += 1;
        }
        accepted
    }

    /// Ingest a batch and restart the quiescence window.
    pub fn observe(&mut self, nodes: &[AddedNode], tx: &mpsc::UnboundedSender<SessionInput>) {
        let accepted = self.ingest(nodes);
        debug!(
            "Response batch: {}/{} nodes kept, buffer {} chars",
            accepted,
            nodes.len(),
            self.buffer.len()
        );
        self.quiet
            .schedule(tx, |generation| SessionInput::Quiescent { generation });
    }

    /// Quiescence timer expired. Flushes only for the live timer.
    pub fn on_quiescent(&mut self, generation: u64) -> Option<String> {
        if !self.quiet.fire(generation) {
            return None;
        }
        self.flush()
    }

    /// Normalize and drain the buffer. `None` when nothing but whitespace
    /// was collected.
    pub fn flush(&mut self) -> Option<String> {
        let text = normalize_whitespace(&self.buffer);
        self.buffer.clear();
        (!text.is_empty()).then_some(text)
    }

    /// Drop buffered text and any pending timer.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.quiet.cancel();
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_waiting(&self) -> bool {
        self.quiet.is_pending()
    }

    fn is_noise(&self, text: &str) -> bool {
        self.noise_tokens.iter().any(|token| token == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> AssistantAggregator {
        AssistantAggregator::new(Duration::from_millis(700), vec!["4o".into()])
    }

    #[test]
    fn test_normalize_collapses_and_trims() {
        assert_eq!(normalize_whitespace("  a\n\n b\t c  "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["", "x", "  lead", "trail \n", "a  b\r\nc", "\u{a0}nbsp\u{2003}em"] {
            let once = normalize_whitespace(input);
            assert_eq!(normalize_whitespace(&once), once);
        }
    }

    #[test]
    fn test_text_fragments_join_verbatim() {
        let mut agg = aggregator();
        agg.ingest(&[AddedNode::text("Hel")]);
        agg.ingest(&[AddedNode::text("lo ")]);
        agg.ingest(&[AddedNode::text("world")]);
        assert_eq!(agg.flush().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_elements_are_space_separated() {
        let mut agg = aggregator();
        let kept = agg.ingest(&[
            AddedNode::element("First paragraph."),
            AddedNode::element("\n  Second\nparagraph. "),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(agg.flush().as_deref(), Some("First paragraph. Second paragraph."));
    }

    #[test]
    fn test_noise_and_empty_nodes_are_dropped() {
        let mut agg = aggregator();
        let kept = agg.ingest(&[
            AddedNode::element("4o"),
            AddedNode::element(" 4o "),
            AddedNode::text("   "),
            AddedNode {
                node_type: ELEMENT_NODE,
                text: None,
            },
            AddedNode {
                node_type: 8,
                text: Some("comment".into()),
            },
        ]);
        assert_eq!(kept, 0);
        assert_eq!(agg.flush(), None);
    }

    #[test]
    fn test_noise_must_match_exactly() {
        let mut agg = aggregator();
        agg.ingest(&[AddedNode::element("4o mini")]);
        assert_eq!(agg.flush().as_deref(), Some("4o mini"));
    }

    #[test]
    fn test_flush_empties_buffer() {
        let mut agg = aggregator();
        agg.ingest(&[AddedNode::element("once")]);
        assert!(agg.flush().is_some());
        assert_eq!(agg.buffered_len(), 0);
        assert_eq!(agg.flush(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_flush() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut agg = aggregator();
        agg.observe(&[AddedNode::element("partial")], &tx);
        agg.observe(&[AddedNode::element("answer")], &tx);

        assert_eq!(agg.on_quiescent(1), None);
        assert!(agg.is_waiting());

        match rx.recv().await {
            Some(SessionInput::Quiescent { generation }) => {
                assert_eq!(agg.on_quiescent(generation).as_deref(), Some("partial answer"));
            }
            other => panic!("unexpected input: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_timer() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut agg = aggregator();
        agg.observe(&[AddedNode::element("dropped")], &tx);
        agg.reset();
        assert!(!agg.is_waiting());
        assert_eq!(agg.buffered_len(), 0);
    }
}
