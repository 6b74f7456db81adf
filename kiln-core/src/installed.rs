// kiln-core/src/installed.rs
use std::path::PathBuf;

use kiln_common::config::Config;
use kiln_common::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::receipt::{InstallReceipt, RECEIPT_FILE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledPackageInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// `None` when the prefix has no readable receipt (e.g. an interrupted install).
    pub receipt: Option<InstallReceipt>,
}

/// Every `Cellar/<name>/<version>` prefix, sorted by name then version.
pub fn get_installed_packages(config: &Config) -> Result<Vec<InstalledPackageInfo>> {
    let cellar = config.cellar_dir();
    if !cellar.is_dir() {
        debug!("Cellar directory {} does not exist.", cellar.display());
        return Ok(Vec::new());
    }

    let mut installed = Vec::new();
    for entry in WalkDir::new(&cellar)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error reading entry in {}: {}", cellar.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let prefix = entry.path();
        let (Some(version), Some(name)) = (
            prefix.file_name(),
            prefix.parent().and_then(|p| p.file_name()),
        ) else {
            continue;
        };
        let receipt = if prefix.join(RECEIPT_FILE).is_file() {
            match InstallReceipt::read(prefix) {
                Ok(receipt) => Some(receipt),
                Err(e) => {
                    warn!("Ignoring unreadable receipt in {}: {}", prefix.display(), e);
                    None
                }
            }
        } else {
            None
        };
        installed.push(InstalledPackageInfo {
            name: name.to_string_lossy().to_string(),
            version: version.to_string_lossy().to_string(),
            path: prefix.to_path_buf(),
            receipt,
        });
    }
    Ok(installed)
}
