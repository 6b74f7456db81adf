use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_common::error::{KilnError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tempfile::NamedTempFile;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::validation::{validate_url, verify_checksum};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "kiln source installer (Rust)";

/// Retrieves the archive `url` (or one of its `mirrors`) for `name` into
/// `downloads_dir` and verifies it against `sha256_expected`.
///
/// A cached copy is reused when it still matches the hash and discarded otherwise.
/// A hash mismatch on freshly fetched bytes is fatal: the file is deleted and no
/// mirror is tried.
pub async fn fetch_archive(
    name: &str,
    url: &str,
    sha256_expected: &str,
    mirrors: &[String],
    downloads_dir: &Path,
) -> Result<PathBuf> {
    let primary = validate_url(url)?;
    let cache_path = downloads_dir.join(cache_file_name(name, &primary));

    debug!("Preparing to fetch '{}' from URL: {}", name, url);
    debug!("Target cache path: {}", cache_path.display());

    if cache_path.is_file() {
        match verify_checksum(&cache_path, name, sha256_expected) {
            Ok(()) => {
                debug!("Using valid cached file: {}", cache_path.display());
                return Ok(cache_path);
            }
            Err(e) => {
                debug!(
                    "Cached file {} is stale ({}). Redownloading.",
                    cache_path.display(),
                    e
                );
                if let Err(remove_err) = fs::remove_file(&cache_path) {
                    warn!(
                        "Failed to remove stale cached file {}: {}",
                        cache_path.display(),
                        remove_err
                    );
                }
            }
        }
    }

    fs::create_dir_all(downloads_dir).map_err(|e| {
        KilnError::Config(format!(
            "Failed to create download cache {}: {}",
            downloads_dir.display(),
            e
        ))
    })?;

    let mut client: Option<Client> = None;
    let mut last_error: Option<KilnError> = None;
    let candidates = std::iter::once(Ok(primary)).chain(mirrors.iter().map(|m| validate_url(m)));

    for candidate in candidates {
        let current = candidate?;
        debug!("Attempting fetch from: {}", current);
        let attempt = if current.scheme() == "file" {
            copy_local(&current, &cache_path, name, sha256_expected).await
        } else {
            if client.is_none() {
                client = Some(build_http_client()?);
            }
            match &client {
                Some(c) => download_and_verify(c, &current, &cache_path, name, sha256_expected).await,
                None => Err(KilnError::Generic("HTTP client unavailable".to_string())),
            }
        };
        match attempt {
            Ok(path) => {
                debug!("Fetched and verified: {}", path.display());
                return Ok(path);
            }
            Err(e @ KilnError::Integrity { .. }) => {
                error!("Integrity check failed for {} from {}", name, current);
                return Err(e);
            }
            Err(e) => {
                error!("Fetch attempt failed from {}: {}", current, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        KilnError::DownloadError(
            name.to_string(),
            url.to_string(),
            "All download attempts failed.".to_string(),
        )
    }))
}

fn cache_file_name(name: &str, url: &Url) -> String {
    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "download".to_string());
    format!("{name}-{file_name}")
}

/// A fresh, uniquely named partial-download file next to `final_path`. It is
/// deleted when dropped unless persisted.
fn temp_file_for(final_path: &Path) -> Result<NamedTempFile> {
    let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = format!(
        ".{}.",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    Ok(tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".download")
        .tempfile_in(dir)?)
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(KilnError::from)
}

async fn copy_local(
    url: &Url,
    final_path: &Path,
    name: &str,
    sha256_expected: &str,
) -> Result<PathBuf> {
    let source = url.to_file_path().map_err(|_| {
        KilnError::ValidationError(format!("'{url}' is not a usable local file URL"))
    })?;
    let temp = temp_file_for(final_path)?;
    tokio::fs::copy(&source, temp.path()).await.map_err(|e| {
        KilnError::DownloadError(name.to_string(), url.to_string(), e.to_string())
    })?;
    promote_verified(temp, final_path, name, sha256_expected)
}

async fn download_and_verify(
    client: &Client,
    url: &Url,
    final_path: &Path,
    name: &str,
    sha256_expected: &str,
) -> Result<PathBuf> {
    let temp = temp_file_for(final_path)?;
    debug!("Downloading to temporary path: {}", temp.path().display());

    let mut response = client.get(url.clone()).send().await?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        let reason = match status {
            StatusCode::NOT_FOUND => "Resource not found (404)".to_string(),
            StatusCode::FORBIDDEN => "Access forbidden (403)".to_string(),
            _ => format!("HTTP error {status}"),
        };
        return Err(KilnError::DownloadError(
            name.to_string(),
            url.to_string(),
            reason,
        ));
    }

    let mut temp_file = TokioFile::from_std(temp.reopen()?);
    while let Some(chunk) = response.chunk().await? {
        temp_file.write_all(&chunk).await?;
    }
    temp_file.flush().await?;
    drop(temp_file);
    debug!("Finished writing download stream to temp file.");

    promote_verified(temp, final_path, name, sha256_expected)
}

/// Verifies a fetched file and moves it into the cache; a rejected file is
/// deleted when `temp` drops.
fn promote_verified(
    temp: NamedTempFile,
    final_path: &Path,
    name: &str,
    sha256_expected: &str,
) -> Result<PathBuf> {
    verify_checksum(temp.path(), name, sha256_expected)?;
    temp.persist(final_path).map_err(|e| KilnError::from(e.error))?;
    debug!(
        "Moved verified file to final location: {}",
        final_path.display()
    );
    Ok(final_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::sha256_file;

    fn write_source(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("pyusb-1.0.0b1.tar.gz");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn fetches_local_file_into_cache() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), b"archive bytes");
        let sha = sha256_file(&source).unwrap();
        let url = Url::from_file_path(&source).unwrap();

        let fetched = fetch_archive("pyusb", url.as_str(), &sha, &[], cache.path())
            .await
            .unwrap();
        assert_eq!(fetched, cache.path().join("pyusb-pyusb-1.0.0b1.tar.gz"));
        assert_eq!(fs::read(&fetched).unwrap(), b"archive bytes");

        // Second fetch is served from the cache even if the source disappears.
        fs::remove_file(&source).unwrap();
        let again = fetch_archive("pyusb", url.as_str(), &sha, &[], cache.path())
            .await
            .unwrap();
        assert_eq!(again, fetched);
    }

    #[tokio::test]
    async fn mismatch_leaves_nothing_in_cache() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), b"tampered bytes");
        let url = Url::from_file_path(&source).unwrap();

        let err = fetch_archive("pyusb", url.as_str(), &"0".repeat(64), &[], cache.path())
            .await
            .unwrap_err();
        assert!(matches!(err, KilnError::Integrity { .. }));
        assert_eq!(fs::read_dir(cache.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_mirror_when_primary_is_missing() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), b"mirror bytes");
        let sha = sha256_file(&source).unwrap();
        let missing = src.path().join("gone").join("pyusb-1.0.0b1.tar.gz");
        let mirror = source.to_string_lossy().to_string();

        let fetched = fetch_archive(
            "pyusb",
            &missing.to_string_lossy(),
            &sha,
            &[mirror],
            cache.path(),
        )
        .await
        .unwrap();
        assert_eq!(fs::read(fetched).unwrap(), b"mirror bytes");
    }

    #[tokio::test]
    async fn concurrent_fetches_of_one_archive_both_succeed() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), &vec![7u8; 1 << 20]);
        let sha = sha256_file(&source).unwrap();
        let url = Url::from_file_path(&source).unwrap();

        let (a, b) = tokio::join!(
            fetch_archive("pyusb", url.as_str(), &sha, &[], cache.path()),
            fetch_archive("pyusb", url.as_str(), &sha, &[], cache.path()),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        let leftovers: Vec<_> = fs::read_dir(cache.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }
}
