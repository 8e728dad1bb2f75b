//! Availability-window evaluation for shared links.
//!
//! A link is `pending` before its window opens, `active` inside it and `expired`
//! once the upper bound is reached. The upper bound is inclusive on the expired
//! side, so a zero-width window (`from == to`) is never reported as open.
//!
//! The evaluation here is purely local. When the local clock crosses a boundary
//! the caller must re-fetch metadata rather than trusting the flip; see
//! [`countdown`](crate::countdown).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a shared link
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// The window has not opened yet
    Pending,
    /// Content may be requested
    Active,
    /// The window has closed
    Expired,
}

impl LinkStatus {
    /// Parse a server-reported status string; unknown values yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "scheduled" => Some(LinkStatus::Pending),
            "active" | "available" => Some(LinkStatus::Active),
            "expired" | "deleted" => Some(LinkStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Active => "active",
            LinkStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Evaluate the availability window at `now`
///
/// Absent bounds mean "no lower/upper bound".
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use sharelink::link_state::{LinkStatus, evaluate};
///
/// let now = Utc::now();
/// assert_eq!(evaluate(now, None, None), LinkStatus::Active);
/// assert_eq!(evaluate(now, Some(now + Duration::hours(1)), None), LinkStatus::Pending);
/// assert_eq!(evaluate(now, None, Some(now)), LinkStatus::Expired);
/// ```
pub fn evaluate(
    now: DateTime<Utc>,
    available_from: Option<DateTime<Utc>>,
    available_to: Option<DateTime<Utc>>,
) -> LinkStatus {
    if let Some(to) = available_to
        && now >= to
    {
        return LinkStatus::Expired;
    }
    if let Some(from) = available_from
        && now < from
    {
        return LinkStatus::Pending;
    }
    LinkStatus::Active
}

/// Combine the server's reported status with the local window evaluation
///
/// - `expired` from either side wins; the gate refuses locally
/// - otherwise a server claim wins over the local clock
/// - without a server claim the window decides
pub fn reconcile(server: Option<LinkStatus>, local: LinkStatus) -> LinkStatus {
    match (server, local) {
        (Some(LinkStatus::Expired), _) | (_, LinkStatus::Expired) => LinkStatus::Expired,
        (Some(reported), _) => reported,
        (None, local) => local,
    }
}

/// Move a status confirmed at the last fetch forward to `now`
///
/// The clock may only push a link toward `expired`. Leaving `pending` takes a
/// fresh fetch.
pub fn advance(confirmed: LinkStatus, current: LinkStatus) -> LinkStatus {
    match (confirmed, current) {
        (_, LinkStatus::Expired) => LinkStatus::Expired,
        (confirmed, _) => confirmed,
    }
}
