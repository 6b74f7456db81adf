/*
File: kiln-net/src/git.rs
Purpose: head-source checkouts using git2.
*/
use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use kiln_common::error::{KilnError, Result};
use tracing::{debug, error};

/// Clones the head source `url` into `dest` and returns the checked-out commit id.
///
/// `dest` must not exist yet or be empty. The clone runs on a blocking thread.
pub async fn checkout_head(url: &str, branch: Option<&str>, dest: &Path) -> Result<String> {
    let url = url.to_string();
    let branch = branch.map(str::to_string);
    let dest: PathBuf = dest.to_path_buf();
    tokio::task::spawn_blocking(move || clone_blocking(&url, branch.as_deref(), &dest))
        .await
        .map_err(|e| KilnError::Generic(format!("JoinError in head checkout: {e}")))?
}

fn clone_blocking(url: &str, branch: Option<&str>, dest: &Path) -> Result<String> {
    debug!(
        "Cloning head source {} (branch: {}) into {}",
        url,
        branch.unwrap_or("default"),
        dest.display()
    );
    let mut builder = RepoBuilder::new();
    if let Some(branch) = branch {
        builder.branch(branch);
    }
    let repo = builder.clone(url, dest).map_err(|e| {
        error!("Failed to clone {}: {}", url, e);
        KilnError::DownloadError(dest_name(dest), url.to_string(), e.message().to_string())
    })?;
    let head = repo.head()?;
    let commit = head.peel_to_commit()?;
    let id = commit.id().to_string();
    debug!("Checked out {} at {}", url, id);
    Ok(id)
}

fn dest_name(dest: &Path) -> String {
    dest.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
