// kiln-net/src/validation.rs
use std::fs::File;
use std::io;
use std::path::Path;

use kiln_common::error::{KilnError, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Hex-encoded SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let bytes_copied = io::copy(&mut file, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    tracing::debug!(
        "Calculated SHA256 of {}: {} ({} bytes read)",
        path.display(),
        actual,
        bytes_copied
    );
    Ok(actual)
}

/// Verifies `path` against the declared content hash of `name`.
///
/// A mismatch is reported as [`KilnError::Integrity`]; callers must not unpack
/// or build the file afterwards.
pub fn verify_checksum(path: &Path, name: &str, expected: &str) -> Result<()> {
    tracing::debug!("Verifying checksum for: {}", path.display());
    let actual = sha256_file(path)?;
    tracing::debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KilnError::Integrity {
            name: name.to_string(),
            expected: expected.to_ascii_lowercase(),
            actual,
        })
    }
}

/// Parses a source URL, accepting `http(s)://` and `file://`, plus absolute local
/// paths which are turned into `file://` URLs.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let path = Path::new(url_str);
    if path.is_absolute() {
        return Url::from_file_path(path).map_err(|_| {
            KilnError::ValidationError(format!("Invalid local source path '{url_str}'"))
        });
    }
    let url = Url::parse(url_str)
        .map_err(|e| KilnError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(KilnError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be http, https or file, but got '{other}'"
        ))),
    }
}
