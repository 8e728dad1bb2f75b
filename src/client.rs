//! HTTP client for the delivery endpoints
//!
//! [`ShareApi`] wraps one `reqwest::Client` and exposes the three calls the
//! access flow needs:
//!
//! - `GET {base}/files/{token}`: public metadata
//! - `GET {base}/files/info/{fileId}`: extended metadata (bearer only)
//! - `GET {base}/files/{token}/download`: content bytes
//!
//! Every failure leaves this module as a [`ClassifiedError`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier::{self, ClassifiedError};
use crate::config::{Config, TimeoutConfig};
use crate::error::{Error, Result};
use crate::retriever::ContentSource;
use crate::session::SessionStore;
use crate::types::{FileId, FileMetadata, MetadataEnvelope, ShareLink, ShareToken};
use crate::view::LinkSource;

/// Client for the share delivery API
#[derive(Clone)]
pub struct ShareApi {
    http: reqwest::Client,
    base: Url,
    password_header: HeaderName,
    timeouts: TimeoutConfig,
    session: Arc<dyn SessionStore>,
}

impl ShareApi {
    /// Build a client from validated configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an unusable configuration and
    /// [`Error::HttpClient`] when the HTTP client cannot be constructed.
    pub fn new(config: &Config, session: Arc<dyn SessionStore>) -> Result<Self> {
        config.validate()?;

        let base = Url::parse(&config.api_base_url)?;
        if base.cannot_be_a_base() {
            return Err(Error::config("api_base_url", "must be a hierarchical URL"));
        }
        let password_header = HeaderName::from_bytes(config.password_header.as_bytes())
            .map_err(|e| Error::config("password_header", e.to_string()))?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base,
            password_header,
            timeouts: config.timeouts.clone(),
            session,
        })
    }

    /// Session the client reads the bearer token from
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Endpoint URL below the configured base; segments are percent-encoded
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ClassifiedError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| classifier::local_failure("api base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn with_bearer(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> std::result::Result<Response, ClassifiedError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classifier::classify_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classifier::classify_response(status.as_u16(), &body);
        debug!(status = status.as_u16(), kind = ?err.kind(), "request failed");
        Err(err)
    }

    async fn read_metadata(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<FileMetadata, ClassifiedError> {
        let response = self.send(request, self.timeouts.metadata).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classifier::classify_transport(&e))?;

        serde_json::from_slice::<MetadataEnvelope>(&body)
            .map(MetadataEnvelope::into_inner)
            .map_err(|e| classifier::malformed_response(status, e.to_string()))
    }

    /// Public metadata for a share token
    pub async fn public_metadata(
        &self,
        token: &ShareToken,
    ) -> std::result::Result<FileMetadata, ClassifiedError> {
        let url = self.endpoint(&["files", token.as_str()])?;
        debug!(%token, "fetching public metadata");
        self.read_metadata(self.http.get(url)).await
    }

    /// Extended metadata for a file, using the session's bearer token
    pub async fn extended_metadata(
        &self,
        file_id: &FileId,
    ) -> std::result::Result<FileMetadata, ClassifiedError> {
        let url = self.endpoint(&["files", "info", file_id.as_str()])?;
        debug!(%file_id, "fetching extended metadata");
        self.read_metadata(self.with_bearer(self.http.get(url))).await
    }

    /// Metadata for a token, enriched with extended metadata when signed in
    ///
    /// The effective status is confirmed against the system clock at fetch time.
    ///
    /// A failing extended call is logged and otherwise ignored; the public
    /// metadata is returned unchanged in that case.
    pub async fn fetch_link(
        &self,
        token: &ShareToken,
    ) -> std::result::Result<ShareLink, ClassifiedError> {
        let public = self.public_metadata(token).await?;

        let metadata = if self.session.token().is_some() {
            let file_id = FileId::new(public.id.clone());
            match self.extended_metadata(&file_id).await {
                Ok(extended) => extended,
                Err(e) => {
                    warn!(
                        %token,
                        %file_id,
                        kind = ?e.kind(),
                        "extended metadata unavailable, using public metadata"
                    );
                    public
                }
            }
        } else {
            public
        };

        let mut link = ShareLink::from_metadata(token.clone(), metadata);
        let status = link.confirm(Utc::now());
        info!(
            %token,
            file_name = %link.file_name,
            has_password = link.has_password,
            %status,
            "link metadata loaded"
        );
        Ok(link)
    }
}

#[async_trait]
impl ContentSource for ShareApi {
    async fn fetch(
        &self,
        token: &ShareToken,
        password: Option<&str>,
    ) -> std::result::Result<Bytes, ClassifiedError> {
        let url = self.endpoint(&["files", token.as_str(), "download"])?;

        let mut request = self.with_bearer(self.http.get(url));
        if let Some(password) = password {
            let mut value = HeaderValue::from_str(password).map_err(|_| {
                classifier::local_failure("password contains characters that cannot be sent")
            })?;
            value.set_sensitive(true);
            request = request.header(self.password_header.clone(), value);
        }

        debug!(%token, with_password = password.is_some(), "fetching content");
        let response = self.send(request, self.timeouts.content).await?;
        response
            .bytes()
            .await
            .map_err(|e| classifier::classify_transport(&e))
    }
}

#[async_trait]
impl LinkSource for ShareApi {
    async fn fetch_link(
        &self,
        token: &ShareToken,
    ) -> std::result::Result<ShareLink, ClassifiedError> {
        ShareApi::fetch_link(self, token).await
    }
}

impl std::fmt::Debug for ShareApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareApi")
            .field("base", &self.base.as_str())
            .field("password_header", &self.password_header)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
