//! In-memory transcript with write-behind persistence.
//!
//! Memory is authoritative for the live session. Every append queues a
//! snapshot of the affected logs for the persistence writer; a failed write
//! is logged and dropped, never rolled back or retried. Clearing goes through
//! the same queue, so a removal always lands after the writes queued before it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::tags::extract_tags;
use crate::types::{Message, Transcript};
use chatlog_core::{Error, Result};
use chatlog_store::{keys, KvStore, StorageChange};

/// One commit for the persistence writer.
#[derive(Debug)]
pub enum PersistRequest {
    /// Write several keys at once.
    Set { entries: Vec<(String, Value)> },
    /// Remove keys; `done` receives the outcome once committed.
    Remove {
        keys: Vec<&'static str>,
        done: Option<oneshot::Sender<Result<()>>>,
    },
}

pub type PersistQueue = mpsc::UnboundedSender<PersistRequest>;

/// Start the ordered persistence writer. Requests are committed one at a
/// time in the order they were queued.
pub fn spawn_persistence_writer(store: Arc<dyn KvStore>) -> (PersistQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistRequest>();
    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let store = store.clone();
            match request {
                PersistRequest::Set { entries } => {
                    let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
                    match tokio::task::spawn_blocking(move || store.set(entries)).await {
                        Ok(Ok(())) => debug!("Persisted {:?}", keys),
                        Ok(Err(e)) => warn!("Failed to persist {:?}: {}", keys, e),
                        Err(e) => warn!("Persistence task for {:?} failed: {}", keys, e),
                    }
                }
                PersistRequest::Remove { keys, done } => {
                    let removing = keys.clone();
                    let result = tokio::task::spawn_blocking(move || store.remove(&removing))
                        .await
                        .unwrap_or_else(|e| Err(Error::Internal(e.to_string())));
                    match &result {
                        Ok(()) => debug!("Removed {:?}", keys),
                        Err(e) => warn!("Failed to remove {:?}: {}", keys, e),
                    }
                    if let Some(done) = done {
                        let _ = done.send(result);
                    }
                }
            }
        }
    });
    (tx, handle)
}

pub struct MessageStore {
    user_log: Vec<Message>,
    full_log: Vec<Message>,
    /// Most recent user message, kept for traceability.
    latest_user: Option<Message>,
    persist: PersistQueue,
}

impl MessageStore {
    pub fn new(persist: PersistQueue) -> Self {
        Self {
            user_log: Vec::new(),
            full_log: Vec::new(),
            latest_user: None,
            persist,
        }
    }

    /// Append a user turn. Empty or absent text is ignored.
    pub fn append_user(&mut self, text: Option<&str>) -> Option<&Message> {
        let text = text.filter(|t| !t.trim().is_empty())?;
        let message = Message::user(text, extract_tags(text));

        self.user_log.push(message.clone());
        self.full_log.push(message.clone());
        info!("Captured user message ({} chars, tags={:?})", text.len(), message.tags);

        self.persist(&[keys::QUESTIONS, keys::FULL_CONVERSATION]);
        self.latest_user = Some(message);
        self.latest_user.as_ref()
    }

    /// Append an assistant turn. Empty or absent text is ignored.
    pub fn append_assistant(&mut self, text: Option<&str>) -> Option<&Message> {
        let text = text.filter(|t| !t.trim().is_empty())?;
        self.full_log.push(Message::assistant(text));
        info!("Captured assistant message ({} chars)", text.len());

        self.persist(&[keys::FULL_CONVERSATION]);
        self.full_log.last()
    }

    /// Clear both logs. Persistent storage is left alone.
    pub fn reset(&mut self) {
        self.user_log.clear();
        self.full_log.clear();
        self.latest_user = None;
    }

    /// Clear all: drop both logs and queue their removal from storage behind
    /// any pending writes. `done` is answered once the removal is committed.
    pub fn clear_all(&mut self, done: Option<oneshot::Sender<Result<()>>>) {
        self.reset();
        let request = PersistRequest::Remove {
            keys: keys::TRANSCRIPT_KEYS.to_vec(),
            done,
        };
        if let Err(mpsc::error::SendError(request)) = self.persist.send(request) {
            warn!("Persistence writer stopped; stored transcript not cleared");
            if let PersistRequest::Remove { done: Some(done), .. } = request {
                let _ = done.send(Err(Error::Internal("persistence writer stopped".into())));
            }
        }
        info!("Transcript cleared");
    }

    /// Mirror removals made by other actors.
    pub fn on_storage_change(&mut self, change: &StorageChange) {
        if change.is_removal_of(keys::QUESTIONS) {
            self.user_log.clear();
            self.latest_user = None;
            info!("'{}' cleared in storage; dropped in-memory user log", keys::QUESTIONS);
        } else if change.is_removal_of(keys::FULL_CONVERSATION) {
            self.full_log.clear();
            info!(
                "'{}' cleared in storage; dropped in-memory conversation log",
                keys::FULL_CONVERSATION
            );
        }
    }

    pub fn user_log(&self) -> &[Message] {
        &self.user_log
    }

    pub fn full_log(&self) -> &[Message] {
        &self.full_log
    }

    pub fn latest_user(&self) -> Option<&Message> {
        self.latest_user.as_ref()
    }

    pub fn transcript(&self) -> Transcript {
        Transcript {
            user_log: self.user_log.clone(),
            full_log: self.full_log.clone(),
        }
    }

    fn persist(&self, which: &[&str]) {
        let mut entries = Vec::with_capacity(which.len());
        for key in which {
            let log = if *key == keys::QUESTIONS {
                &self.user_log
            } else {
                &self.full_log
            };
            match serde_json::to_value(log) {
                Ok(value) => entries.push((key.to_string(), value)),
                Err(e) => warn!("Failed to serialize '{}': {}", key, e),
            }
        }
        if entries.is_empty() {
            return;
        }
        if self.persist.send(PersistRequest::Set { entries }).is_err() {
            warn!("Persistence writer stopped; transcript kept in memory only");
        }
    }
}
