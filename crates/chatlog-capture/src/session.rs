//! Capture session: the single owner of all reconstruction state.
//!
//! One tokio task drains a queue of [`SessionInput`]s. Page events, control
//! commands, storage notifications, timer expiries and deferred reads all
//! pass through that queue, so every state change happens in arrival order
//! on one task and no locking is needed.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::aggregator::AssistantAggregator;
use crate::attach::{AttachmentController, Surface};
use crate::message_store::{spawn_persistence_writer, MessageStore, PersistQueue};
use crate::page::{ElementId, Page, PageEvent};
use crate::types::{ControlCommand, SessionStatus, Transcript};
use crate::user_turn::UserTurnCapture;
use chatlog_core::{CaptureConfig, Error, Result};
use chatlog_store::{KvStore, StorageChange};

/// Everything the session task reacts to.
#[derive(Debug)]
pub enum SessionInput {
    Page(PageEvent),
    Control(ControlCommand),
    Storage(StorageChange),
    /// The response quiescence window elapsed.
    Quiescent { generation: u64 },
    /// One queue turn after a form submission.
    SubmitSettled { form: ElementId },
    /// A surface lookup is due again.
    Retry { surface: Surface, generation: u64 },
    /// Drop both logs and remove them from storage, in order with writes.
    ClearAll(oneshot::Sender<Result<()>>),
    Snapshot(oneshot::Sender<Transcript>),
    Status(oneshot::Sender<SessionStatus>),
    Shutdown,
}

pub struct CaptureSession {
    id: String,
    page: Arc<dyn Page>,
    store: MessageStore,
    user: UserTurnCapture,
    aggregator: AssistantAggregator,
    attachments: AttachmentController,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl CaptureSession {
    pub fn new(
        config: &CaptureConfig,
        page: Arc<dyn Page>,
        persist: PersistQueue,
        tx: mpsc::UnboundedSender<SessionInput>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            page,
            store: MessageStore::new(persist),
            user: UserTurnCapture::new(),
            aggregator: AssistantAggregator::new(config.quiescence(), config.noise_tokens.clone()),
            attachments: AttachmentController::new(config.selectors.clone(), config.retry_interval()),
            tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// First attachment attempt; anything missing is retried.
    pub fn start(&mut self) {
        self.attach_listeners();
        self.attach_output();
        info!("Capture session {} started", self.id);
    }

    /// Drain the queue until shutdown or until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionInput>) {
        self.start();
        while let Some(input) = rx.recv().await {
            if !self.handle(input) {
                break;
            }
        }
        info!("Capture session {} stopped", self.id);
    }

    /// Process one input. Returns `false` on shutdown.
    pub fn handle(&mut self, input: SessionInput) -> bool {
        match input {
            SessionInput::Page(event) => {
                self.page.observe(&event);
                self.on_page_event(event);
            }
            SessionInput::Control(ControlCommand::ResetData) => self.reset(),
            SessionInput::Storage(change) => self.store.on_storage_change(&change),
            SessionInput::Quiescent { generation } => {
                if let Some(text) = self.aggregator.on_quiescent(generation) {
                    self.store.append_assistant(Some(&text));
                }
            }
            SessionInput::SubmitSettled { form } => self.on_submit_settled(form),
            SessionInput::Retry {
                surface,
                generation,
            } => {
                if self.attachments.on_retry(surface, generation) {
                    match surface {
                        Surface::Output => self.attach_output(),
                        Surface::Input | Surface::Form => self.attach_listeners(),
                    }
                }
            }
            SessionInput::ClearAll(reply) => {
                self.store.clear_all(Some(reply));
            }
            SessionInput::Snapshot(reply) => {
                let _ = reply.send(self.store.transcript());
            }
            SessionInput::Status(reply) => {
                let _ = reply.send(self.status());
            }
            SessionInput::Shutdown => return false,
        }
        true
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            input_bound: self.attachments.bound(Surface::Input).is_some(),
            form_bound: self.attachments.bound(Surface::Form).is_some(),
            output_bound: self.attachments.bound(Surface::Output).is_some(),
            pending_input: self.user.pending().is_some(),
            buffered_chars: self.aggregator.buffered_len(),
            user_messages: self.store.user_log().len(),
            total_messages: self.store.full_log().len(),
        }
    }

    fn on_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Structure { .. } => {
                self.attach_listeners();
                self.attach_output();
            }
            PageEvent::KeyDown {
                target,
                key,
                shift_key,
                ..
            } => {
                if self.attachments.surface_of(target) == Some(Surface::Input) {
                    let text = self.surface_text(target);
                    self.user.on_key_down(&key, shift_key, &text);
                }
            }
            PageEvent::InputMutation { target, .. } => {
                if self.attachments.surface_of(target) == Some(Surface::Input) {
                    let text = self.surface_text(target);
                    if let Some(question) = self.user.on_input_mutation(&text) {
                        self.store.append_user(Some(&question));
                    }
                }
            }
            PageEvent::Submit { target } => {
                if self.attachments.surface_of(target) == Some(Surface::Form) {
                    // Read after the page has had a turn to clear the composer.
                    let _ = self.tx.send(SessionInput::SubmitSettled { form: target });
                }
            }
            PageEvent::NodesAdded { root, nodes } => {
                if self.attachments.surface_of(root) == Some(Surface::Output) {
                    self.aggregator.observe(&nodes, &self.tx);
                }
            }
        }
    }

    fn on_submit_settled(&mut self, form: ElementId) {
        debug!("Submit settled for form {}", form);
        let text = self
            .attachments
            .bound(Surface::Input)
            .map(|input| self.surface_text(input))
            .unwrap_or_default();
        if let Some(question) = self.user.on_submit_settled(&text) {
            self.store.append_user(Some(&question));
        }
    }

    fn attach_listeners(&mut self) {
        if !self.attachments.attach_listeners(self.page.as_ref()) {
            self.attachments.schedule_retry(Surface::Input, &self.tx);
        }
    }

    fn attach_output(&mut self) {
        if !self.attachments.attach_output(self.page.as_ref()) {
            self.attachments.schedule_retry(Surface::Output, &self.tx);
        }
    }

    fn reset(&mut self) {
        self.store.reset();
        self.user.clear();
        self.aggregator.reset();
        info!("Capture session {} data reset", self.id);
    }

    fn surface_text(&self, element: ElementId) -> String {
        self.page.inner_text(element).unwrap_or_default()
    }
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    /// Start a session with its persistence writer and storage listener.
    pub fn spawn(config: &CaptureConfig, page: Arc<dyn Page>, store: Arc<dyn KvStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let changes = store.subscribe();
        let (persist, _writer) = spawn_persistence_writer(store);

        let session = CaptureSession::new(config, page, persist, tx.clone());
        let id = session.id().to_string();

        tokio::spawn(forward_storage_changes(changes, tx.clone()));
        tokio::spawn(session.run(rx));

        Self { id, tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_event(&self, event: PageEvent) -> Result<()> {
        self.send(SessionInput::Page(event))
    }

    pub fn control(&self, command: ControlCommand) -> Result<()> {
        self.send(SessionInput::Control(command))
    }

    /// Clear all captured messages, in memory and in storage. Resolves once
    /// the removal is committed behind every write queued before it.
    pub async fn clear_all(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::ClearAll(reply))?;
        rx.await.map_err(|_| stopped())?
    }

    /// Current in-memory transcript.
    pub async fn snapshot(&self) -> Result<Transcript> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::Snapshot(reply))?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionInput::Status(reply))?;
        rx.await.map_err(|_| stopped())
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionInput::Shutdown);
    }

    fn send(&self, input: SessionInput) -> Result<()> {
        self.tx.send(input).map_err(|_| stopped())
    }
}

fn stopped() -> Error {
    Error::Internal("capture session stopped".into())
}

async fn forward_storage_changes(
    mut changes: broadcast::Receiver<StorageChange>,
    tx: mpsc::UnboundedSender<SessionInput>,
) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                if tx.send(SessionInput::Storage(change)).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Storage listener lagged; {} notifications skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::page::{AddedNode, RelayPage};
    use crate::types::MessageType;
    use chatlog_store::{keys, MemoryStore};

    const INPUT: ElementId = 7;
    const FORM: ElementId = 8;
    const MAIN: ElementId = 2;

    fn structure(input: Option<ElementId>) -> PageEvent {
        let selectors = chatlog_core::Selectors::default();
        let mut elements = HashMap::from([(selectors.output, MAIN), (selectors.form, FORM)]);
        if let Some(id) = input {
            elements.insert(selectors.input, id);
        }
        PageEvent::Structure { elements }
    }

    fn mounted_page() -> Arc<RelayPage> {
        let page = Arc::new(RelayPage::new());
        page.apply(&structure(Some(INPUT)));
        page
    }

    fn spawn(page: Arc<RelayPage>) -> (SessionHandle, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let handle = SessionHandle::spawn(&CaptureConfig::default(), page, store.clone());
        (handle, store)
    }

    fn enter(text: &str) -> PageEvent {
        PageEvent::KeyDown {
            target: INPUT,
            key: "Enter".into(),
            shift_key: false,
            text: text.into(),
        }
    }

    fn cleared() -> PageEvent {
        PageEvent::InputMutation {
            target: INPUT,
            text: String::new(),
        }
    }

    fn response(nodes: Vec<AddedNode>) -> PageEvent {
        PageEvent::NodesAdded { root: MAIN, nodes }
    }

    async fn pause(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_turn_then_streamed_answer() {
        let (session, _store) = spawn(mounted_page());

        session.page_event(enter("note #x")).unwrap();
        session.page_event(cleared()).unwrap();
        for fragment in ["Hel", "lo ", "world"] {
            session.page_event(response(vec![AddedNode::text(fragment)])).unwrap();
            pause(300).await;
        }
        pause(700).await;

        let transcript = session.snapshot().await.unwrap();
        assert_eq!(transcript.user_log.len(), 1);
        assert_eq!(transcript.user_log[0].tags, vec!["x"]);
        assert_eq!(transcript.full_log.len(), 2);
        assert_eq!(transcript.full_log[0], transcript.user_log[0]);
        assert_eq!(transcript.full_log[1].kind, MessageType::Assistant);
        assert_eq!(transcript.full_log[1].text, "Hello world");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_silence() {
        let (session, _store) = spawn(mounted_page());

        // Fragments keep arriving well past one window from the first.
        for i in 0..5 {
            session
                .page_event(response(vec![AddedNode::element(format!("part{}", i))]))
                .unwrap();
            pause(400).await;
        }
        let status = session.status().await.unwrap();
        assert_eq!(status.total_messages, 0);
        assert!(status.buffered_chars > 0);

        pause(400).await;
        let transcript = session.snapshot().await.unwrap();
        assert_eq!(transcript.full_log.len(), 1);
        assert_eq!(transcript.full_log[0].text, "part0 part1 part2 part3 part4");
        assert!(transcript.user_log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_only_batch_produces_nothing() {
        let (session, _store) = spawn(mounted_page());
        session
            .page_event(response(vec![AddedNode::element("4o")]))
            .unwrap();
        pause(1000).await;
        assert!(session.snapshot().await.unwrap().full_log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redundant_signals_finalize_once() {
        let (session, _store) = spawn(mounted_page());

        session.page_event(enter("hello")).unwrap();
        session.page_event(PageEvent::Submit { target: FORM }).unwrap();
        session.page_event(cleared()).unwrap();
        pause(10).await;

        // Submission whose deferred read still sees the text.
        session.page_event(enter("second")).unwrap();
        session.page_event(PageEvent::Submit { target: FORM }).unwrap();
        pause(10).await;
        session.page_event(cleared()).unwrap();

        let transcript = session.snapshot().await.unwrap();
        let texts: Vec<&str> = transcript.user_log.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "second"]);
        assert_eq!(transcript.full_log.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_without_keypress_reads_surface() {
        let (session, _store) = spawn(mounted_page());
        session
            .page_event(PageEvent::InputMutation {
                target: INPUT,
                text: "clicked send".into(),
            })
            .unwrap();
        session.page_event(PageEvent::Submit { target: FORM }).unwrap();
        pause(10).await;

        let transcript = session.snapshot().await.unwrap();
        assert_eq!(transcript.user_log.len(), 1);
        assert_eq!(transcript.user_log[0].text, "clicked send");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_from_unbound_elements_are_ignored() {
        let (session, _store) = spawn(mounted_page());
        session
            .page_event(PageEvent::KeyDown {
                target: 99,
                key: "Enter".into(),
                shift_key: false,
                text: "elsewhere".into(),
            })
            .unwrap();
        session
            .page_event(PageEvent::InputMutation {
                target: 99,
                text: String::new(),
            })
            .unwrap();
        session
            .page_event(PageEvent::NodesAdded {
                root: 99,
                nodes: vec![AddedNode::element("sidebar")],
            })
            .unwrap();
        pause(1000).await;
        assert!(session.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_input_is_bound_by_retry() {
        let page = Arc::new(RelayPage::new());
        page.apply(&structure(None));
        let (session, _store) = spawn(page.clone());

        let status = session.status().await.unwrap();
        assert!(!status.input_bound);
        assert!(status.output_bound);

        // Mounted without a structure notification reaching the session.
        page.apply(&structure(Some(INPUT)));
        pause(1100).await;
        assert!(session.status().await.unwrap().input_bound);

        session.page_event(enter("late")).unwrap();
        session.page_event(cleared()).unwrap();
        assert_eq!(session.snapshot().await.unwrap().user_log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_composer_is_rebound_on_structure_change() {
        let (session, _store) = spawn(mounted_page());
        session.page_event(structure(Some(21))).unwrap();
        session
            .page_event(PageEvent::KeyDown {
                target: 21,
                key: "Enter".into(),
                shift_key: false,
                text: "after navigation".into(),
            })
            .unwrap();
        session
            .page_event(PageEvent::InputMutation {
                target: 21,
                text: String::new(),
            })
            .unwrap();

        let transcript = session.snapshot().await.unwrap();
        assert_eq!(transcript.user_log[0].text, "after navigation");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_everything() {
        let (session, _store) = spawn(mounted_page());
        session.page_event(enter("question")).unwrap();
        session.page_event(cleared()).unwrap();
        session.page_event(enter("half typed")).unwrap();
        session
            .page_event(response(vec![AddedNode::element("in flight")]))
            .unwrap();

        session.control(ControlCommand::ResetData).unwrap();
        pause(1000).await;

        let status = session.status().await.unwrap();
        assert!(!status.pending_input);
        assert_eq!(status.buffered_chars, 0);
        assert!(session.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_and_reacts_to_external_clear() {
        let config = CaptureConfig {
            quiescence_ms: 20,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new());
        let session = SessionHandle::spawn(&config, mounted_page(), store.clone());

        session.page_event(enter("keep me")).unwrap();
        session.page_event(cleared()).unwrap();
        session
            .page_event(response(vec![AddedNode::element("answer")]))
            .unwrap();

        let mut persisted = Transcript::default();
        for _ in 0..100 {
            persisted = Transcript::load(store.as_ref()).unwrap();
            if persisted.full_log.len() == 2 {
                break;
            }
            pause(10).await;
        }
        assert_eq!(persisted.user_log.len(), 1);
        assert_eq!(persisted.full_log.len(), 2);

        store.remove(&keys::TRANSCRIPT_KEYS).unwrap();
        let mut live = session.snapshot().await.unwrap();
        for _ in 0..100 {
            if live.is_empty() {
                break;
            }
            pause(10).await;
            live = session.snapshot().await.unwrap();
        }
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_right_after_capture() {
        let store = Arc::new(MemoryStore::new());
        let session = SessionHandle::spawn(&CaptureConfig::default(), mounted_page(), store.clone());

        session.page_event(enter("forget me")).unwrap();
        session.page_event(cleared()).unwrap();
        assert_eq!(session.snapshot().await.unwrap().user_log.len(), 1);

        session.clear_all().await.unwrap();
        assert!(session.snapshot().await.unwrap().is_empty());
        assert!(Transcript::load(store.as_ref()).unwrap().is_empty());

        // Give any stray write time to land; none may resurrect the logs.
        pause(100).await;
        assert!(session.snapshot().await.unwrap().is_empty());
        assert!(Transcript::load(store.as_ref()).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_session() {
        let (session, _store) = spawn(mounted_page());
        session.shutdown();
        pause(10).await;
        assert!(session.snapshot().await.is_err());
    }
}
