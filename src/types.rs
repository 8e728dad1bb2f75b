//! Core types for sharelink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::link_state::{self, LinkStatus};

/// Opaque share token taken from a shared link
///
/// Possession implies access subject to gating, so it is treated as a capability
/// but not as a secret on the level of a password.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Wrap a raw token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShareToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Server-side file identifier (used by the extended metadata endpoint)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Wrap a raw file id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Password supplied by the visitor for a protected link
///
/// Lives only in view state for one visit. `Debug` never prints the value and
/// the type is deliberately not serializable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessCredential {
    password: Option<String>,
}

impl AccessCredential {
    /// Credential carrying a password
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }

    /// Credential without a password
    pub fn none() -> Self {
        Self::default()
    }

    /// The password, if one was entered and it is non-empty
    pub fn secret(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// True when no usable password is present
    pub fn is_empty(&self) -> bool {
        self.secret().is_none()
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("password", &self.secret().map(|_| "<redacted>"))
            .finish()
    }
}

/// Metadata returned by `GET /files/{token}` and `GET /files/info/{fileId}`
///
/// This is the only place the wire shape is interpreted; everything else in the
/// crate consumes [`ShareLink`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File identifier (string or number on the wire)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Display name of the file
    #[serde(alias = "name")]
    pub file_name: String,

    /// Size in bytes
    #[serde(default, alias = "size")]
    pub file_size: u64,

    /// MIME type, if the server knows it
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Whether a password is required
    #[serde(default, alias = "passwordProtected")]
    pub has_password: bool,

    /// Start of the availability window
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,

    /// End of the availability window
    #[serde(default, alias = "expiresAt")]
    pub available_to: Option<DateTime<Utc>>,

    /// Status as reported by the server
    #[serde(default)]
    pub status: Option<String>,

    /// Uploader display name (extended metadata only)
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

/// Accepts both `{ "file": {...} }` and bare metadata objects
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum MetadataEnvelope {
    Wrapped { file: FileMetadata },
    Bare(FileMetadata),
}

impl MetadataEnvelope {
    pub(crate) fn into_inner(self) -> FileMetadata {
        match self {
            MetadataEnvelope::Wrapped { file } | MetadataEnvelope::Bare(file) => file,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// A shared link as seen by the client
#[derive(Clone, Debug, PartialEq)]
pub struct ShareLink {
    /// Token the link was opened with
    pub token: ShareToken,
    /// Server-side file id
    pub file_id: FileId,
    /// Display name of the file
    pub file_name: String,
    /// Size in bytes
    pub file_size_bytes: u64,
    /// MIME type (defaults to `application/octet-stream`)
    pub mime_type: String,
    /// Whether a password is required before retrieval
    pub has_password: bool,
    /// Start of the availability window
    pub available_from: Option<DateTime<Utc>>,
    /// End of the availability window
    pub available_to: Option<DateTime<Utc>>,
    /// Status the server reported with this metadata, if recognised
    pub server_status: Option<LinkStatus>,
    /// Uploader display name, when extended metadata was available
    pub uploaded_by: Option<String>,
    /// Effective status pinned when the metadata was fetched
    pub confirmed_status: Option<LinkStatus>,
}

impl ShareLink {
    /// Build a link from freshly fetched metadata
    pub fn from_metadata(token: ShareToken, metadata: FileMetadata) -> Self {
        let server_status = metadata.status.as_deref().and_then(LinkStatus::parse);
        Self {
            token,
            file_id: FileId::new(metadata.id),
            file_name: metadata.file_name,
            file_size_bytes: metadata.file_size,
            mime_type: metadata
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            has_password: metadata.has_password,
            available_from: metadata.available_from,
            available_to: metadata.available_to,
            server_status,
            uploaded_by: metadata.uploaded_by,
            confirmed_status: None,
        }
    }

    /// Pin the effective status at `now` as the fetched state
    pub fn confirm(&mut self, now: DateTime<Utc>) -> LinkStatus {
        self.confirmed_status = None;
        let status = self.status_at(now);
        self.confirmed_status = Some(status);
        status
    }

    /// Status from the availability window alone
    pub fn window_status_at(&self, now: DateTime<Utc>) -> LinkStatus {
        link_state::evaluate(now, self.available_from, self.available_to)
    }

    /// Effective status at `now`, combining the window with the server's claim
    ///
    /// Once [`confirm`](Self::confirm)ed, the clock can only move the link to
    /// `expired`; a pending link stays pending until it is fetched again.
    pub fn status_at(&self, now: DateTime<Utc>) -> LinkStatus {
        let current = link_state::reconcile(self.server_status, self.window_status_at(now));
        match self.confirmed_status {
            Some(confirmed) => link_state::advance(confirmed, current),
            None => current,
        }
    }
}
