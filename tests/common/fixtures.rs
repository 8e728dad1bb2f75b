//! Metadata fixtures and mock server helpers

use serde_json::{Value, json};
use sharelink::{Config, NavigationConfig};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Share token used throughout the integration tests
pub const TOKEN: &str = "abc123xyz";

/// File id the fixtures report for [`TOKEN`]
pub const FILE_ID: &str = "42";

/// Public metadata of an active file
pub fn metadata(file_name: &str, mime_type: &str, has_password: bool) -> Value {
    json!({
        "id": 42,
        "fileName": file_name,
        "fileSize": 8_543_210,
        "mimeType": mime_type,
        "hasPassword": has_password,
        "status": "active",
        "availableFrom": null,
        "availableTo": null
    })
}

/// Configuration pointing at the mock server with a short redirect delay
pub fn test_config(server: &MockServer, download_dir: &Path) -> Config {
    Config {
        api_base_url: format!("{}/api", server.uri()),
        share_origin: "https://share.example.com".to_string(),
        download_dir: download_dir.to_path_buf(),
        navigation: NavigationConfig {
            redirect_delay: Duration::from_millis(50),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Serve `body` as the public metadata of [`TOKEN`]
pub async fn mount_metadata(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/files/{TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `bytes` as the content of [`TOKEN`] for any request
pub async fn mount_content(server: &MockServer, status: u16, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/api/files/{TOKEN}/download")))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}
