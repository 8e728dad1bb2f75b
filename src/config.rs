//! Configuration types for sharelink

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Per-operation request timeouts
///
/// Metadata lookups are small and should fail fast; content retrieval may move
/// large files and gets a much longer budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for metadata and other small JSON requests (default: 15 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata: Duration,

    /// Timeout for content retrieval, preview or download (default: 10 minutes)
    #[serde(default = "default_content_timeout", with = "duration_serde")]
    pub content: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata_timeout(),
            content: default_content_timeout(),
        }
    }
}

/// Login redirect behaviour after an authentication failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Path of the login entry point (default: "/login")
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Query parameter carrying the return target (default: "redirect")
    #[serde(default = "default_return_param")]
    pub return_param: String,

    /// Delay before navigating so the user can read the message (default: 2000 ms)
    #[serde(default = "default_redirect_delay", with = "duration_ms_serde")]
    pub redirect_delay: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            return_param: default_return_param(),
            redirect_delay: default_redirect_delay(),
        }
    }
}

/// Main configuration for the shared-link client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the file-sharing API (default: "http://localhost:8080/api")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Public origin used when building shareable links (default: "http://localhost:3000")
    #[serde(default = "default_share_origin")]
    pub share_origin: String,

    /// Header carrying the link password (default: "X-File-Password")
    #[serde(default = "default_password_header")]
    pub password_header: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Login redirect behaviour
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Countdown refresh cadence while a link is pending (default: 1000 ms)
    #[serde(default = "default_countdown_tick", with = "duration_ms_serde")]
    pub countdown_tick: Duration,

    /// Directory the filesystem download sink writes into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            share_origin: default_share_origin(),
            password_header: default_password_header(),
            user_agent: default_user_agent(),
            timeouts: TimeoutConfig::default(),
            navigation: NavigationConfig::default(),
            countdown_tick: default_countdown_tick(),
            download_dir: default_download_dir(),
        }
    }
}

impl Config {
    /// Check the configuration for values the client cannot work with
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.api_base_url)
            .map_err(|e| Error::config("api_base_url", format!("not a valid URL: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::config(
                "api_base_url",
                format!("unsupported scheme '{}'", base.scheme()),
            ));
        }

        reqwest::header::HeaderName::from_bytes(self.password_header.as_bytes()).map_err(|_| {
            Error::config(
                "password_header",
                format!("'{}' is not a valid header name", self.password_header),
            )
        })?;

        if self.timeouts.metadata.is_zero() {
            return Err(Error::config("timeouts.metadata", "must be greater than zero"));
        }
        if self.timeouts.content.is_zero() {
            return Err(Error::config("timeouts.content", "must be greater than zero"));
        }
        if self.countdown_tick.is_zero() {
            return Err(Error::config("countdown_tick", "must be greater than zero"));
        }
        if !self.navigation.login_path.starts_with('/') {
            return Err(Error::config(
                "navigation.login_path",
                "must be an absolute path starting with '/'",
            ));
        }
        if self.navigation.return_param.is_empty() {
            return Err(Error::config("navigation.return_param", "must not be empty"));
        }

        Ok(())
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8080/api".into()
}

fn default_share_origin() -> String {
    "http://localhost:3000".into()
}

fn default_password_header() -> String {
    "X-File-Password".into()
}

fn default_user_agent() -> String {
    concat!("sharelink/", env!("CARGO_PKG_VERSION")).into()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_content_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_login_path() -> String {
    "/login".into()
}

fn default_return_param() -> String {
    "redirect".into()
}

fn default_redirect_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_countdown_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Sub-second durations (redirect delay, tick cadence)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
