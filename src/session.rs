//! Injected session and navigation capabilities
//!
//! The access flow never reaches into global storage or a global location
//! object. It is handed a [`SessionStore`] for the bearer token and a
//! [`Navigator`] for redirects, which keeps the redirect side effect observable
//! in tests.

use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Holder of the current bearer token
///
/// Initialized at application start; cleared exactly on logout or when the
/// server reports that authentication is required.
pub trait SessionStore: Send + Sync {
    /// Current bearer token, if signed in
    fn token(&self) -> Option<String>;

    /// Store a new bearer token
    fn set_token(&self, token: String);

    /// Forget the bearer token
    fn clear(&self);
}

/// In-memory [`SessionStore`]
#[derive(Clone, Default)]
pub struct MemorySession {
    token: Arc<RwLock<Option<String>>>,
}

impl MemorySession {
    /// Empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that starts signed in
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Explicit logout
    pub fn logout(&self) {
        info!("session logout");
        self.clear();
    }
}

impl SessionStore for MemorySession {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_token(&self, token: String) {
        match self.token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    fn clear(&self) {
        debug!("clearing session token");
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("signed_in", &self.token().is_some())
            .finish()
    }
}

/// Navigation capability of the hosting UI
pub trait Navigator: Send + Sync {
    /// Path (plus query) of the page currently shown, used as a return target
    fn current_location(&self) -> String;

    /// Navigate to `path`
    fn go_to(&self, path: &str);
}
