//! Utility functions for display formatting, share URLs and download paths

use crate::error::{Error, Result};
use crate::types::ShareToken;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Human-readable file size with one decimal, e.g. `"8.1 MB"`
///
/// # Examples
///
/// ```
/// use sharelink::utils::format_file_size;
///
/// assert_eq!(format_file_size(0), "0.0 B");
/// assert_eq!(format_file_size(194_560), "190.0 KB");
/// ```
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Short label for a MIME type: the upper-cased subtype (`application/pdf` → `PDF`)
#[must_use]
pub fn file_type_label(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.rsplit('/').next())
        .map(str::trim)
        .filter(|subtype| !subtype.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "FILE".to_string())
}

/// Public URL of a shared link, for "copy link"
#[must_use]
pub fn share_url(origin: &str, token: &ShareToken) -> String {
    format!(
        "{}/f/{}",
        origin.trim_end_matches('/'),
        urlencoding::encode(token.as_str())
    )
}

/// Reduce a server-supplied file name to a safe single path component
///
/// Path separators and control characters are replaced, leading dots are
/// stripped so the result can never escape the target directory or become a
/// hidden file.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Path inside `dir` for `file_name` that does not exist yet
///
/// If `dir/file_name` is taken, ` (1)`, ` (2)`, ... is inserted before the
/// extension until a free name is found.
///
/// # Errors
///
/// Returns [`Error::SaveFailed`] when no free name is found.
pub fn collision_free_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let extension = as_path.extension().and_then(|e| e.to_str());

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = dir.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(Error::SaveFailed {
        file_name: file_name.to_string(),
        dir: dir.to_path_buf(),
        reason: format!("could not find a free name after {MAX_RENAME_ATTEMPTS} attempts"),
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_file_size_units() {
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(8_543_210), "8.1 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_file_size(5 * 1024_u64.pow(4)), "5.0 TB");
        assert_eq!(format_file_size(2048 * 1024_u64.pow(4)), "2048.0 TB");
    }

    #[test]
    fn test_file_type_label() {
        assert_eq!(file_type_label("application/pdf"), "PDF");
        assert_eq!(file_type_label("image/svg+xml"), "SVG+XML");
        assert_eq!(file_type_label("text/plain; charset=utf-8"), "PLAIN");
        assert_eq!(file_type_label(""), "FILE");
        assert_eq!(file_type_label("weird"), "WEIRD");
    }

    #[test]
    fn test_share_url() {
        let token = ShareToken::new("abc123xyz");
        assert_eq!(
            share_url("https://share.example.com/", &token),
            "https://share.example.com/f/abc123xyz"
        );
        let odd = ShareToken::new("a b/c");
        assert_eq!(share_url("http://x", &odd), "http://x/f/a%20b%2Fc");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("a\\b:c"), "a_b_c");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name("   "), "download");
        assert_eq!(sanitize_file_name("Báo cáo Q3.pdf"), "Báo cáo Q3.pdf");
    }

    #[test]
    fn test_collision_free_path_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = collision_free_path(temp_dir.path(), "test.txt").unwrap();
        assert_eq!(path, temp_dir.path().join("test.txt"));
    }

    #[test]
    fn test_collision_free_path_with_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.txt"), "original").unwrap();

        let unique = collision_free_path(temp_dir.path(), "test.txt").unwrap();
        assert_eq!(unique, temp_dir.path().join("test (1).txt"));

        fs::write(&unique, "first rename").unwrap();
        let unique2 = collision_free_path(temp_dir.path(), "test.txt").unwrap();
        assert_eq!(unique2, temp_dir.path().join("test (2).txt"));
    }

    #[test]
    fn test_collision_free_path_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes"), "original").unwrap();

        let unique = collision_free_path(temp_dir.path(), "notes").unwrap();
        assert_eq!(unique, temp_dir.path().join("notes (1)"));
    }

    #[test]
    fn test_collision_free_path_multiple_dots() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("archive.tar.gz"), "original").unwrap();

        let unique = collision_free_path(temp_dir.path(), "archive.tar.gz").unwrap();
        assert_eq!(unique, temp_dir.path().join("archive.tar (1).gz"));
    }
}
