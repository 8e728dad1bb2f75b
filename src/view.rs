//! Page controller for a shared link
//!
//! [`SharedLinkView`] ties the components together for one visit: it loads the
//! link metadata, runs the countdown while the link is pending (re-validating
//! against the server when it elapses), routes preview and download requests
//! through the [`AccessGate`] and publishes everything the UI needs as
//! [`ViewEvent`]s on a broadcast channel.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::classifier::{self, ClassifiedError, ErrorKind};
use crate::client::ShareApi;
use crate::config::Config;
use crate::countdown::{Clock, CountdownEvent, CountdownHandle, CountdownScheduler, SystemClock};
use crate::error::Result;
use crate::gate::{AccessGate, AccessOutcome, AccessPurpose};
use crate::handle::MemoryHandleStore;
use crate::link_state::LinkStatus;
use crate::preview::{self, PreviewTarget};
use crate::retriever::{ContentRetriever, FileSystemSink};
use crate::session::{Navigator, SessionStore};
use crate::types::{AccessCredential, ShareLink, ShareToken};
use crate::utils;

const EVENT_CAPACITY: usize = 64;

/// Source of link metadata
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Load the metadata behind `token`
    async fn fetch_link(&self, token: &ShareToken)
    -> std::result::Result<ShareLink, ClassifiedError>;
}

/// Event published by a [`SharedLinkView`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// Metadata was (re)loaded
    Loaded(Box<ShareLinkSummary>),
    /// The effective link status changed
    StatusChanged(LinkStatus),
    /// Countdown tick while pending
    Countdown {
        /// Time left until the window opens
        remaining: Duration,
        /// `remaining` in display form
        display: String,
    },
    /// Preview content is ready
    PreviewReady(PreviewTarget),
    /// A password must be entered first
    AwaitingCredential,
    /// A download was saved
    Downloaded {
        /// Where the file ended up
        path: PathBuf,
    },
    /// An operation failed
    Failed(ClassifiedError),
    /// A login redirect has been scheduled
    Redirecting {
        /// Login URL including the return target
        target: String,
    },
}

/// Display data for a loaded link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareLinkSummary {
    /// File name
    pub file_name: String,
    /// Size in display form, e.g. `"8.1 MB"`
    pub size: String,
    /// Short type label, e.g. `"PDF"`
    pub type_label: String,
    /// Whether a password is required
    pub has_password: bool,
    /// Whether the content can be previewed in place
    pub previewable: bool,
    /// Uploader, when known
    pub uploaded_by: Option<String>,
    /// Link to share
    pub share_url: String,
}

struct Inner {
    token: ShareToken,
    links: Arc<dyn LinkSource>,
    gate: Arc<AccessGate>,
    scheduler: CountdownScheduler,
    clock: Arc<dyn Clock>,
    share_origin: String,
    events: broadcast::Sender<ViewEvent>,
    link: Mutex<Option<ShareLink>>,
    last_status: Mutex<Option<LinkStatus>>,
    countdown: Mutex<Option<CountdownHandle>>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl Inner {
    fn emit(&self, event: ViewEvent) {
        // No subscribers is not an error
        self.events.send(event).ok();
    }

    fn summary(&self, link: &ShareLink) -> ShareLinkSummary {
        ShareLinkSummary {
            file_name: link.file_name.clone(),
            size: utils::format_file_size(link.file_size_bytes),
            type_label: utils::file_type_label(&link.mime_type),
            has_password: link.has_password,
            previewable: preview::can_preview(&link.mime_type),
            uploaded_by: link.uploaded_by.clone(),
            share_url: utils::share_url(&self.share_origin, &link.token),
        }
    }

    fn set_status(&self, status: LinkStatus) {
        let changed = lock(&self.last_status).replace(status) != Some(status);
        if changed {
            info!(token = %self.token, %status, "link status changed");
            self.emit(ViewEvent::StatusChanged(status));
        }
    }

    /// Only a successful fetch can move a pending link to active
    async fn refresh(self: &Arc<Self>) -> std::result::Result<ShareLink, ClassifiedError> {
        let mut link = match self.links.fetch_link(&self.token).await {
            Ok(link) => link,
            Err(err) => {
                self.emit(ViewEvent::Failed(err.clone()));
                self.absorb_failure(&err);
                return Err(err);
            }
        };
        if self.closed.load(Ordering::SeqCst) {
            return Ok(link);
        }

        let status = link.confirm(self.clock.now());
        *lock(&self.link) = Some(link.clone());
        self.emit(ViewEvent::Loaded(Box::new(self.summary(&link))));
        self.set_status(status);

        if status == LinkStatus::Pending {
            let target = link.available_from.unwrap_or_else(|| self.clock.now());
            self.start_countdown(target);
        } else {
            self.stop_countdown();
        }
        Ok(link)
    }

    fn start_countdown(self: &Arc<Self>, target: chrono::DateTime<chrono::Utc>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.scheduler.start(target, tx);
        let remaining = handle.initial_remaining();
        *lock(&self.countdown) = Some(handle);

        self.emit(ViewEvent::Countdown {
            remaining,
            display: crate::countdown::format_remaining(remaining),
        });
        tokio::spawn(watch_countdown(Arc::downgrade(self), rx));
    }

    fn stop_countdown(&self) {
        if let Some(handle) = lock(&self.countdown).take() {
            handle.cancel();
        }
    }

    fn mark_expired(&self) {
        let had_link = match lock(&self.link).as_mut() {
            Some(link) => {
                link.server_status = Some(LinkStatus::Expired);
                true
            }
            None => false,
        };
        if had_link {
            self.stop_countdown();
            self.set_status(LinkStatus::Expired);
        }
    }

    /// A server answer saying the link is gone closes it for this visit
    fn absorb_failure(&self, err: &ClassifiedError) {
        if err.is_local() {
            return;
        }
        if matches!(err.kind(), ErrorKind::Expired | ErrorKind::NotFound) {
            self.mark_expired();
        }
    }
}

async fn watch_countdown(inner: Weak<Inner>, mut events: mpsc::UnboundedReceiver<CountdownEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            CountdownEvent::Tick { remaining, display } => {
                inner.emit(ViewEvent::Countdown { remaining, display });
            }
            CountdownEvent::Elapsed => {
                debug!(token = %inner.token, "countdown elapsed, re-validating link");
                // Failures are published as events by refresh
                inner.refresh().await.ok();
            }
        }
    }
}

/// Controller for one visit of a shared link
pub struct SharedLinkView {
    inner: Arc<Inner>,
}

impl SharedLinkView {
    /// Create a view from its parts
    pub fn new(
        token: ShareToken,
        links: Arc<dyn LinkSource>,
        gate: Arc<AccessGate>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                token,
                links,
                gate,
                scheduler: CountdownScheduler::new(Arc::clone(&clock), config.countdown_tick),
                clock,
                share_origin: config.share_origin.clone(),
                events,
                link: Mutex::new(None),
                last_status: Mutex::new(None),
                countdown: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Wire a view against the HTTP API with in-memory handles and a
    /// filesystem download sink in `config.download_dir`
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(
        config: &Config,
        token: ShareToken,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let api = Arc::new(ShareApi::new(config, Arc::clone(&session))?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let retriever = Arc::new(ContentRetriever::new(
            api.clone(),
            Arc::new(MemoryHandleStore::new()),
            Arc::new(FileSystemSink::new(config.download_dir.clone())),
        ));
        let gate = Arc::new(AccessGate::new(
            retriever,
            session,
            navigator,
            Arc::clone(&clock),
            config.navigation.clone(),
        ));
        Ok(Self::new(token, api, gate, clock, config))
    }

    /// Subscribe to view events
    pub fn events(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    /// View events as a stream; lagged events are skipped
    pub fn event_stream(&self) -> impl Stream<Item = ViewEvent> + use<> {
        BroadcastStream::new(self.events()).filter_map(|event| event.ok())
    }

    /// Load the link metadata and start a countdown if it is pending
    pub async fn open(&self) -> std::result::Result<ShareLink, ClassifiedError> {
        info!(token = %self.inner.token, "opening shared link");
        self.inner.refresh().await
    }

    /// Re-fetch the link metadata
    pub async fn reload(&self) -> std::result::Result<ShareLink, ClassifiedError> {
        self.inner.refresh().await
    }

    /// Last loaded link
    pub fn link(&self) -> Option<ShareLink> {
        lock(&self.inner.link).clone()
    }

    /// Effective status of the loaded link right now
    pub fn status(&self) -> Option<LinkStatus> {
        let now = self.inner.clock.now();
        lock(&self.inner.link).as_ref().map(|link| link.status_at(now))
    }

    /// Display data of the loaded link
    pub fn summary(&self) -> Option<ShareLinkSummary> {
        lock(&self.inner.link)
            .as_ref()
            .map(|link| self.inner.summary(link))
    }

    /// True while a countdown is running
    pub fn counting_down(&self) -> bool {
        lock(&self.inner.countdown)
            .as_ref()
            .is_some_and(|h| h.state() == crate::countdown::CountdownState::Running)
    }

    /// Preview the file
    pub async fn preview(
        &self,
        credential: &AccessCredential,
    ) -> std::result::Result<AccessOutcome, ClassifiedError> {
        self.access(credential, AccessPurpose::Preview).await
    }

    /// Download the file under its own name
    pub async fn download(
        &self,
        credential: &AccessCredential,
    ) -> std::result::Result<AccessOutcome, ClassifiedError> {
        let file_name = self
            .link()
            .map(|link| link.file_name)
            .unwrap_or_default();
        self.access(credential, AccessPurpose::Download { file_name })
            .await
    }

    async fn access(
        &self,
        credential: &AccessCredential,
        purpose: AccessPurpose,
    ) -> std::result::Result<AccessOutcome, ClassifiedError> {
        let Some(link) = self.link() else {
            return Err(classifier::local_failure("link metadata has not been loaded"));
        };

        let (result, redirect) = self
            .inner
            .gate
            .attempt_tracked(&link, credential, purpose)
            .await;
        match &result {
            Ok(AccessOutcome::AwaitingCredential) => self.inner.emit(ViewEvent::AwaitingCredential),
            Ok(AccessOutcome::Preview(target)) => {
                self.inner.emit(ViewEvent::PreviewReady(target.clone()));
            }
            Ok(AccessOutcome::Downloaded { path }) => {
                self.inner.emit(ViewEvent::Downloaded { path: path.clone() });
            }
            Ok(AccessOutcome::Superseded) => {}
            Err(err) => {
                self.inner.emit(ViewEvent::Failed(err.clone()));
                if let Some(target) = redirect {
                    self.inner.emit(ViewEvent::Redirecting { target });
                }
                self.inner.absorb_failure(err);
            }
        }
        result
    }

    /// Stop the countdown, cancel a pending redirect and revoke the current
    /// preview handle
    pub fn teardown(&self) {
        debug!(token = %self.inner.token, "tearing down view");
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.stop_countdown();
        self.inner.gate.teardown();
    }
}

impl Drop for SharedLinkView {
    fn drop(&mut self) {
        self.teardown();
    }
}
