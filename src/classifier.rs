//! Translation of delivery-endpoint failures into a stable error taxonomy
//!
//! The server does not publish a structured error contract, so part of the
//! mapping relies on substring hints in the free-text message of a 403. Every
//! such heuristic lives in this module and nowhere else, which keeps the
//! behaviour consistent and lets it be swapped for structured codes later
//! without touching callers.
//!
//! | status | message hint | kind |
//! |---|---|---|
//! | 401 | - | [`ErrorKind::AuthRequired`] |
//! | 403 | "password" / "incorrect" | [`ErrorKind::WrongPassword`] |
//! | 403 | "not allowed" / "shared list" | [`ErrorKind::ForbiddenRecipient`] |
//! | 403 | other | [`ErrorKind::Forbidden`] |
//! | 404 | - | [`ErrorKind::NotFound`] |
//! | 410 | - | [`ErrorKind::Expired`] |
//! | 423 | - | [`ErrorKind::NotYetAvailable`] |
//! | no response | - | [`ErrorKind::Network`] |
//! | any other | - | [`ErrorKind::Unknown`] |

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::link_state::LinkStatus;

/// Hints in a 403 message that point at a wrong password
const WRONG_PASSWORD_HINTS: &[&str] = &["password", "incorrect"];

/// Hints in a 403 message that point at a recipient restriction
const RECIPIENT_HINTS: &[&str] = &["not allowed", "shared list"];

/// Machine-checkable failure kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The session is missing or no longer valid
    AuthRequired,
    /// The supplied link password was rejected
    WrongPassword,
    /// The signed-in user is not on the link's recipient list
    ForbiddenRecipient,
    /// Access denied for another reason
    Forbidden,
    /// No such link or file
    NotFound,
    /// The link's window has closed
    Expired,
    /// The link's window has not opened yet
    NotYetAvailable,
    /// No response was received
    Network,
    /// Anything not covered above
    Unknown,
}

impl ErrorKind {
    /// Stable, user-facing message for this kind
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "Please sign in to access this file.",
            ErrorKind::WrongPassword => "The password is incorrect.",
            ErrorKind::ForbiddenRecipient => {
                "You are not allowed to download this file. Your email is not on the shared list."
            }
            ErrorKind::Forbidden => "You do not have permission to access this file.",
            ErrorKind::NotFound => "This file does not exist.",
            ErrorKind::Expired => "This file has expired.",
            ErrorKind::NotYetAvailable => "This file is not available yet.",
            ErrorKind::Network => "Network error. Please check your connection.",
            ErrorKind::Unknown => "Something went wrong while loading the file.",
        }
    }

    /// Machine-readable code, e.g. `"WRONG_PASSWORD"`
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "AUTH_REQUIRED",
            ErrorKind::WrongPassword => "WRONG_PASSWORD",
            ErrorKind::ForbiddenRecipient => "FORBIDDEN_RECIPIENT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Expired => "EXPIRED",
            ErrorKind::NotYetAvailable => "NOT_YET_AVAILABLE",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified retrieval failure
///
/// Only this module constructs values of this type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", .kind.message())]
pub struct ClassifiedError {
    kind: ErrorKind,
    status: Option<u16>,
    detail: Option<String>,
    local: bool,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, status: Option<u16>, detail: Option<String>) -> Self {
        Self {
            kind,
            status,
            detail,
            local: false,
        }
    }

    fn precondition(kind: ErrorKind) -> Self {
        Self {
            kind,
            status: None,
            detail: None,
            local: true,
        }
    }

    /// The failure kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The user-facing message for the kind
    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Server message or transport detail, for logs and diagnostics
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Raised without contacting the server
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// The server answered with a 5xx status
    pub fn is_server_error(&self) -> bool {
        self.status.is_some_and(|s| (500..600).contains(&s))
    }
}

/// Classify a failed response by status and optional server message
pub fn classify(status: u16, server_message: Option<&str>) -> ClassifiedError {
    let detail = server_message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let kind = match status {
        401 => ErrorKind::AuthRequired,
        403 => classify_forbidden(detail.as_deref()),
        404 => ErrorKind::NotFound,
        410 => ErrorKind::Expired,
        423 => ErrorKind::NotYetAvailable,
        _ => ErrorKind::Unknown,
    };

    ClassifiedError::new(kind, Some(status), detail)
}

fn classify_forbidden(message: Option<&str>) -> ErrorKind {
    let Some(message) = message else {
        return ErrorKind::Forbidden;
    };
    let lowered = message.to_lowercase();

    if WRONG_PASSWORD_HINTS.iter().any(|h| lowered.contains(h)) {
        ErrorKind::WrongPassword
    } else if RECIPIENT_HINTS.iter().any(|h| lowered.contains(h)) {
        ErrorKind::ForbiddenRecipient
    } else {
        ErrorKind::Forbidden
    }
}

/// Classify a response from its status and raw body
///
/// The body is searched for a JSON `message` (or `error`) field; otherwise the
/// raw text is used as the hint.
pub fn classify_response(status: u16, body: &str) -> ClassifiedError {
    classify(status, extract_server_message(body).as_deref())
}

/// Classify a request that produced no usable response
///
/// Timeouts, refused connections and interrupted bodies all count as
/// [`ErrorKind::Network`]. A status carried by the error is still honoured.
pub fn classify_transport(err: &reqwest::Error) -> ClassifiedError {
    if let Some(status) = err.status() {
        return classify(status.as_u16(), None);
    }
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        return ClassifiedError::new(ErrorKind::Network, None, Some(err.to_string()));
    }
    ClassifiedError::new(ErrorKind::Unknown, None, Some(err.to_string()))
}

/// A connection-level failure described only by text
pub fn network(detail: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Network, None, Some(detail.into()))
}

/// A success response whose body did not have the expected shape
pub fn malformed_response(status: u16, detail: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Unknown, Some(status), Some(detail.into()))
}

/// A local failure that happened after the bytes arrived (e.g. saving a download)
pub fn local_failure(detail: impl Into<String>) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Unknown, None, Some(detail.into()))
}

/// Locally-raised failure for a link that is not active
///
/// Returns `None` for [`LinkStatus::Active`].
pub fn for_status(status: LinkStatus) -> Option<ClassifiedError> {
    match status {
        LinkStatus::Active => None,
        LinkStatus::Pending => Some(ClassifiedError::precondition(ErrorKind::NotYetAvailable)),
        LinkStatus::Expired => Some(ClassifiedError::precondition(ErrorKind::Expired)),
    }
}

fn extract_server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(parsed) => parsed.message.or(parsed.error),
        Err(_) if trimmed.starts_with('{') || trimmed.starts_with('<') => None,
        Err(_) => Some(trimmed.to_string()),
    }
}
