//! Renderer selection for previews

use serde::{Deserialize, Serialize};

use crate::handle::HandleSnapshot;

/// Renderer bucket for a MIME type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// `image/*`
    Image,
    /// `video/*`
    Video,
    /// `audio/*`
    Audio,
    /// `application/pdf`
    Pdf,
    /// `text/*`
    Text,
    /// Nothing previewable; offer download only
    Unsupported,
}

/// Content paired with the renderer that should display it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewTarget {
    /// Selected renderer
    pub renderer: Renderer,
    /// Handle to render
    pub handle: HandleSnapshot,
}

/// Pick the renderer for `mime_type`
///
/// Buckets are checked in order: image, video, audio, exactly
/// `application/pdf`, text, then unsupported. Case and MIME parameters are
/// ignored.
pub fn renderer_for(mime_type: &str) -> Renderer {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("image/") {
        Renderer::Image
    } else if essence.starts_with("video/") {
        Renderer::Video
    } else if essence.starts_with("audio/") {
        Renderer::Audio
    } else if essence == "application/pdf" {
        Renderer::Pdf
    } else if essence.starts_with("text/") {
        Renderer::Text
    } else {
        Renderer::Unsupported
    }
}

/// Whether any renderer applies to `mime_type`
pub fn can_preview(mime_type: &str) -> bool {
    renderer_for(mime_type) != Renderer::Unsupported
}

/// Select the renderer for a retrieved handle
pub fn dispatch(mime_type: &str, handle: HandleSnapshot) -> PreviewTarget {
    PreviewTarget {
        renderer: renderer_for(mime_type),
        handle,
    }
}
