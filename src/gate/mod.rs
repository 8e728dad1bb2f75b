//! Access gate shared by preview and download
//!
//! [`AccessGate::attempt`] checks the local preconditions before anything
//! touches the network:
//!
//! 1. the link must be active right now, otherwise the attempt fails with a
//!    locally raised `NOT_YET_AVAILABLE` or `EXPIRED`;
//! 2. a password-protected link needs a non-empty credential, otherwise the
//!    outcome is [`AccessOutcome::AwaitingCredential`].
//!
//! Only then is the [`ContentRetriever`] asked for the content. An
//! `AUTH_REQUIRED` answer clears the session and schedules a single deferred
//! redirect to the login page, carrying the current location as return target.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::{self, ClassifiedError, ErrorKind};
use crate::config::NavigationConfig;
use crate::countdown::Clock;
use crate::preview::{self, PreviewTarget};
use crate::retriever::{ContentRetriever, PreviewRetrieval};
use crate::session::{Navigator, SessionStore};
use crate::types::{AccessCredential, ShareLink};

/// What the visitor wants to do with the file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessPurpose {
    /// Render the content in place
    Preview,
    /// Save the content under `file_name`
    Download {
        /// Requested file name
        file_name: String,
    },
}

/// Successful result of an access attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The link is password-protected and no password was given
    AwaitingCredential,
    /// Content is ready to render
    Preview(PreviewTarget),
    /// Content was handed to the download sink
    Downloaded {
        /// Where the file was saved
        path: PathBuf,
    },
    /// A newer preview request replaced this one
    Superseded,
}

/// Gate in front of the content retriever
pub struct AccessGate {
    retriever: Arc<ContentRetriever>,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    navigation: NavigationConfig,
    redirect_pending: Arc<AtomicBool>,
    redirect_cancel: Mutex<CancellationToken>,
}

impl AccessGate {
    /// Create a gate
    pub fn new(
        retriever: Arc<ContentRetriever>,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        navigation: NavigationConfig,
    ) -> Self {
        Self {
            retriever,
            session,
            navigator,
            clock,
            navigation,
            redirect_pending: Arc::new(AtomicBool::new(false)),
            redirect_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Local preconditions of [`attempt`](Self::attempt), without any I/O
    ///
    /// `Ok(None)` means the retriever may be called.
    pub fn precheck(
        &self,
        link: &ShareLink,
        credential: &AccessCredential,
    ) -> Result<Option<AccessOutcome>, ClassifiedError> {
        let status = link.status_at(self.clock.now());
        if let Some(err) = classifier::for_status(status) {
            debug!(token = %link.token, %status, "access refused locally");
            return Err(err);
        }
        if link.has_password && credential.is_empty() {
            debug!(token = %link.token, "awaiting credential");
            return Ok(Some(AccessOutcome::AwaitingCredential));
        }
        Ok(None)
    }

    /// Attempt to preview or download `link`
    ///
    /// `WRONG_PASSWORD` leaves the caller's credential untouched so it can be
    /// corrected.
    pub async fn attempt(
        &self,
        link: &ShareLink,
        credential: &AccessCredential,
        purpose: AccessPurpose,
    ) -> Result<AccessOutcome, ClassifiedError> {
        self.attempt_tracked(link, credential, purpose).await.0
    }

    /// [`attempt`](Self::attempt), also returning the login target when this
    /// call scheduled the redirect
    pub(crate) async fn attempt_tracked(
        &self,
        link: &ShareLink,
        credential: &AccessCredential,
        purpose: AccessPurpose,
    ) -> (Result<AccessOutcome, ClassifiedError>, Option<String>) {
        match self.precheck(link, credential) {
            Ok(Some(outcome)) => return (Ok(outcome), None),
            Ok(None) => {}
            Err(err) => return (Err(err), None),
        }

        let result = match purpose {
            AccessPurpose::Preview => self
                .retriever
                .retrieve_for_preview(link, credential)
                .await
                .map(|retrieval| match retrieval {
                    PreviewRetrieval::Installed(handle) => {
                        AccessOutcome::Preview(preview::dispatch(&link.mime_type, handle))
                    }
                    PreviewRetrieval::Superseded => AccessOutcome::Superseded,
                }),
            AccessPurpose::Download { file_name } => self
                .retriever
                .retrieve_for_download(link, &file_name, credential)
                .await
                .map(|path| AccessOutcome::Downloaded { path }),
        };

        let mut scheduled = None;
        if let Err(err) = &result {
            warn!(token = %link.token, kind = ?err.kind(), status = ?err.status(), "access failed");
            if err.kind() == ErrorKind::AuthRequired {
                scheduled = self.handle_auth_required();
            }
        }
        (result, scheduled)
    }

    /// Login URL with the current location as return target
    pub fn redirect_target(&self) -> String {
        format!(
            "{}?{}={}",
            self.navigation.login_path,
            self.navigation.return_param,
            urlencoding::encode(&self.navigator.current_location())
        )
    }

    /// True while a login redirect is scheduled but has not fired
    pub fn redirect_pending(&self) -> bool {
        self.redirect_pending.load(Ordering::SeqCst)
    }

    /// Clears the session and schedules the redirect unless one is pending;
    /// returns the target when a new redirect was scheduled
    fn handle_auth_required(&self) -> Option<String> {
        self.session.clear();

        if self.redirect_pending.swap(true, Ordering::SeqCst) {
            debug!("login redirect already scheduled");
            return None;
        }

        let target = self.redirect_target();
        let cancel = CancellationToken::new();
        match self.redirect_cancel.lock() {
            Ok(mut slot) => *slot = cancel.clone(),
            Err(poisoned) => *poisoned.into_inner() = cancel.clone(),
        }

        info!(%target, delay_ms = self.navigation.redirect_delay.as_millis() as u64, "scheduling login redirect");

        let navigator = Arc::clone(&self.navigator);
        let pending = Arc::clone(&self.redirect_pending);
        let delay = self.navigation.redirect_delay;
        let scheduled = target.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("login redirect cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    navigator.go_to(&target);
                }
            }
            pending.store(false, Ordering::SeqCst);
        });
        Some(scheduled)
    }

    /// Cancel a pending redirect and release the current content handle
    pub fn teardown(&self) {
        match self.redirect_cancel.lock() {
            Ok(slot) => slot.cancel(),
            Err(poisoned) => poisoned.into_inner().cancel(),
        }
        self.retriever.teardown();
    }
}

impl Drop for AccessGate {
    fn drop(&mut self) {
        match self.redirect_cancel.lock() {
            Ok(slot) => slot.cancel(),
            Err(poisoned) => poisoned.into_inner().cancel(),
        }
    }
}
