//! Debounced search-and-mutate controller behind the admin user directory.
//!
//! Every change to the query or entity kind restarts a quiet-period timer;
//! only the input present when the timer fires is sent. Each change also
//! bumps a generation counter, and a response is applied only while its
//! generation is still current, so a slow stale response can never overwrite
//! a newer list.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DirectoryEntry, EntityKind};

pub const DELETE_PROMPT: &str =
    "Are you sure you want to delete this user? This action cannot be undone.";

/// Remote operations the directory needs.
#[async_trait]
pub trait DirectoryBackend: Send + Sync + 'static {
    async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<DirectoryEntry>>;
    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<()>;
}

/// Synchronous yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What a renderer sees.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryView {
    pub query: String,
    pub kind: EntityKind,
    pub phase: Phase,
    pub entries: Vec<DirectoryEntry>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted,
}

struct Control {
    query: String,
    kind: EntityKind,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

struct Shared<B> {
    backend: Arc<B>,
    quiet: Duration,
    control: Mutex<Control>,
    view: watch::Sender<DirectoryView>,
}

pub struct DirectoryController<B: DirectoryBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: DirectoryBackend> DirectoryController<B> {
    pub fn new(backend: Arc<B>, kind: EntityKind, quiet: Duration) -> Self {
        let (view, _) = watch::channel(DirectoryView {
            query: String::new(),
            kind,
            phase: Phase::Idle,
            entries: Vec::new(),
            notice: None,
        });
        Self {
            shared: Arc::new(Shared {
                backend,
                quiet,
                control: Mutex::new(Control {
                    query: String::new(),
                    kind,
                    generation: 0,
                    pending: None,
                }),
                view,
            }),
        }
    }

    /// Schedules the initial search for the current inputs.
    pub fn mount(&self) {
        let mut control = self.shared.lock();
        Shared::schedule(&self.shared, &mut control);
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let mut control = self.shared.lock();
        if control.query == query {
            return;
        }
        control.query = query;
        Shared::schedule(&self.shared, &mut control);
    }

    /// Switching kind drops the old list and searches again after the
    /// quiet period.
    pub fn set_kind(&self, kind: EntityKind) {
        let mut control = self.shared.lock();
        if control.kind == kind {
            return;
        }
        control.kind = kind;
        self.shared.view.send_modify(|view| {
            view.entries.clear();
            view.notice = None;
        });
        Shared::schedule(&self.shared, &mut control);
    }

    pub fn view(&self) -> DirectoryView {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DirectoryView> {
        self.shared.view.subscribe()
    }

    /// Searches immediately, superseding any pending or in-flight search.
    /// Returns `Ok(false)` if a newer input arrived before the response.
    pub async fn refresh(&self) -> Result<bool> {
        let generation = {
            let mut control = self.shared.lock();
            control.generation += 1;
            if let Some(pending) = control.pending.take() {
                pending.abort();
            }
            control.generation
        };
        self.shared.fetch(generation).await
    }

    /// Deletes `id` from the current directory after confirmation. A
    /// declined prompt makes no request; a successful delete is followed by
    /// exactly one refresh.
    pub async fn delete<C>(&self, id: Uuid, confirm: &C) -> Result<DeleteOutcome>
    where
        C: Confirm + ?Sized,
    {
        if !confirm.confirm(DELETE_PROMPT) {
            return Ok(DeleteOutcome::Cancelled);
        }
        let kind = self.shared.lock().kind;
        if let Err(err) = self.shared.backend.delete(kind, id).await {
            warn!(%kind, %id, error = %err, "delete failed");
            self.shared
                .view
                .send_modify(|view| view.notice = Some(Notice::error(err.user_message())));
            return Err(err);
        }
        tracing::info!(%kind, %id, "directory entry deleted");
        if self.refresh().await.is_ok() {
            let message = format!("{} deleted successfully", kind.label());
            self.shared
                .view
                .send_modify(|view| view.notice = Some(Notice::success(message)));
        }
        Ok(DeleteOutcome::Deleted)
    }
}

impl<B: DirectoryBackend> Drop for DirectoryController<B> {
    fn drop(&mut self) {
        if let Some(pending) = self.shared.lock().pending.take() {
            pending.abort();
        }
    }
}

impl<B: DirectoryBackend> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancels any pending timer and starts a new one for the current inputs.
    fn schedule(shared: &Arc<Self>, control: &mut Control) {
        control.generation += 1;
        let generation = control.generation;
        if let Some(pending) = control.pending.take() {
            pending.abort();
        }
        shared.view.send_modify(|view| {
            view.query = control.query.clone();
            view.kind = control.kind;
            view.phase = Phase::Debouncing;
        });

        let task = Arc::clone(shared);
        control.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(task.quiet).await;
            // Failures are already surfaced as a notice.
            let _ = task.fetch(generation).await;
        }));
    }

    async fn fetch(&self, generation: u64) -> Result<bool> {
        let (kind, query) = {
            let mut control = self.lock();
            if control.generation != generation {
                return Ok(false);
            }
            // From here on the request is in flight and only the generation
            // check can discard it.
            control.pending = None;
            self.view.send_modify(|view| view.phase = Phase::Fetching);
            (control.kind, control.query.clone())
        };

        debug!(%kind, query = %query, generation, "directory search");
        let result = self.backend.search(kind, &query).await;
        self.apply(generation, result)
    }

    fn apply(&self, generation: u64, result: Result<Vec<DirectoryEntry>>) -> Result<bool> {
        let control = self.lock();
        if control.generation != generation {
            debug!(
                generation,
                current = control.generation,
                "discarding stale directory response"
            );
            return Ok(false);
        }
        match result {
            Ok(entries) => {
                self.view.send_modify(|view| {
                    view.entries = entries;
                    view.notice = None;
                    view.phase = Phase::Idle;
                });
                Ok(true)
            }
            Err(err) => {
                warn!(error = %err, "directory search failed");
                self.view.send_modify(|view| {
                    view.notice = Some(Notice::error(err.user_message()));
                    view.phase = Phase::Idle;
                });
                Err(err)
            }
        }
    }
}
