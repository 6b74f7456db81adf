// kiln-core/src/receipt.rs
use std::fs::{self, File};
use std::path::Path;

use chrono::{DateTime, Utc};
use kiln_common::error::{KilnError, Result};
use kiln_common::model::{Dependency, ResourceDescriptor};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReceiptSource {
    Archive { url: String, sha256: String },
    Head { url: String, commit: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltOn {
    pub os: String,
    pub arch: String,
}

impl BuiltOn {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// What was installed into a prefix, and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub time: DateTime<Utc>,
    pub source: ReceiptSource,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    pub build_system: String,
    pub built_on: BuiltOn,
}

impl InstallReceipt {
    pub fn write(&self, prefix: &Path) -> Result<()> {
        let receipt_path = prefix.join(RECEIPT_FILE);
        debug!("Writing install receipt: {}", receipt_path.display());
        fs::create_dir_all(prefix)?;
        let file = File::create(&receipt_path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn read(prefix: &Path) -> Result<Self> {
        let receipt_path = prefix.join(RECEIPT_FILE);
        let contents = fs::read_to_string(&receipt_path).map_err(|e| {
            KilnError::InstallError(format!(
                "Cannot read receipt {}: {}",
                receipt_path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use kiln_common::model::DependencyKind;

    use super::*;

    #[test]
    fn receipt_survives_disk() {
        let prefix = tempfile::tempdir().unwrap();
        let receipt = InstallReceipt {
            name: "ubertooth".into(),
            version: "HEAD".into(),
            time: Utc::now(),
            source: ReceiptSource::Head {
                url: "https://github.com/greatscottgadgets/ubertooth.git".into(),
                commit: "abc123".into(),
            },
            dependencies: vec![Dependency::new("cmake", DependencyKind::Build)],
            resources: Vec::new(),
            build_system: "cmake".into(),
            built_on: BuiltOn::current(),
        };
        receipt.write(prefix.path()).unwrap();

        let raw = fs::read_to_string(prefix.path().join(RECEIPT_FILE)).unwrap();
        assert!(raw.contains("\"kind\": \"head\""));
        assert_eq!(InstallReceipt::read(prefix.path()).unwrap(), receipt);
    }

    #[test]
    fn missing_receipt_is_an_install_error() {
        let prefix = tempfile::tempdir().unwrap();
        assert!(matches!(
            InstallReceipt::read(prefix.path()),
            Err(KilnError::InstallError(_))
        ));
    }
}
