//! # sharelink
//!
//! Client-side access lifecycle for shared file links.
//!
//! ## Design Philosophy
//!
//! sharelink is designed to be:
//! - **Server-authoritative** - Local clocks never grant access; they only trigger re-validation
//! - **Leak-free** - Every content handle is revoked exactly once
//! - **Library-first** - No UI, navigation and session storage are injected capabilities
//! - **Event-driven** - The page controller publishes [`ViewEvent`]s, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use sharelink::{AccessCredential, Config, MemorySession, Navigator, SharedLinkView, ShareToken};
//! use std::sync::Arc;
//!
//! struct Browser;
//!
//! impl Navigator for Browser {
//!     fn current_location(&self) -> String {
//!         "/f/abc123".to_string()
//!     }
//!
//!     fn go_to(&self, path: &str) {
//!         println!("navigate to {path}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api_base_url: "https://files.example.com/api".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let view = SharedLinkView::from_config(
//!         &config,
//!         ShareToken::new("abc123"),
//!         Arc::new(MemorySession::new()),
//!         Arc::new(Browser),
//!     )?;
//!
//!     // Subscribe to events
//!     let mut events = view.events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     view.open().await?;
//!     view.preview(&AccessCredential::password("hunter2")).await?;
//!     view.teardown();
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Error classification for delivery failures
pub mod classifier;
/// HTTP client for the delivery endpoints
pub mod client;
/// Configuration types
pub mod config;
/// Countdown for pending links
pub mod countdown;
/// Error types
pub mod error;
/// Access gate for preview and download
pub mod gate;
/// Revocable content handles
pub mod handle;
/// Link status evaluation
pub mod link_state;
/// Renderer selection
pub mod preview;
/// Content retrieval
pub mod retriever;
/// Session and navigation capabilities
pub mod session;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Page controller
pub mod view;

// Re-export commonly used types
pub use classifier::{ClassifiedError, ErrorKind};
pub use client::ShareApi;
pub use config::{Config, NavigationConfig, TimeoutConfig};
pub use countdown::{Clock, CountdownEvent, CountdownHandle, CountdownScheduler, SystemClock};
pub use error::{Error, Result};
pub use gate::{AccessGate, AccessOutcome, AccessPurpose};
pub use handle::{ContentHandle, HandleId, HandleSnapshot, HandleStore, MemoryHandleStore};
pub use link_state::LinkStatus;
pub use preview::{PreviewTarget, Renderer};
pub use retriever::{
    ContentRetriever, ContentSource, DownloadSink, FileSystemSink, PreviewRetrieval,
};
pub use session::{MemorySession, Navigator, SessionStore};
pub use types::{AccessCredential, FileId, FileMetadata, ShareLink, ShareToken};
pub use view::{LinkSource, ShareLinkSummary, SharedLinkView, ViewEvent};
