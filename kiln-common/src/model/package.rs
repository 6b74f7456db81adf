// kiln-common/src/model/package.rs
use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

/// Version label used for installs built from the head source.
pub const HEAD_VERSION: &str = "HEAD";

/// A live, version-control tracked source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Identifies the software an install builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub url: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<HeadSpec>,
}

/// Which of a package's sources an install should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelection {
    #[default]
    Stable,
    Head,
}

/// The single source location active for one install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    Archive {
        url: String,
        sha256: String,
        mirrors: Vec<String>,
    },
    Head {
        url: String,
        branch: Option<String>,
    },
}

impl ResolvedSource {
    pub fn url(&self) -> &str {
        match self {
            Self::Archive { url, .. } | Self::Head { url, .. } => url,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, Self::Head { .. })
    }
}

impl PackageDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve_source(&self, selection: SourceSelection) -> Result<ResolvedSource> {
        match selection {
            SourceSelection::Stable => Ok(ResolvedSource::Archive {
                url: self.url.clone(),
                sha256: self.sha256.clone(),
                mirrors: self.mirrors.clone(),
            }),
            SourceSelection::Head => {
                let head = self.head.as_ref().ok_or_else(|| {
                    KilnError::ValidationError(format!(
                        "{} does not declare a head source",
                        self.name
                    ))
                })?;
                Ok(ResolvedSource::Head {
                    url: head.url.clone(),
                    branch: head.branch.clone(),
                })
            }
        }
    }

    /// The version directory an install with `selection` lands in.
    pub fn install_version(&self, selection: SourceSelection) -> &str {
        match selection {
            SourceSelection::Stable => &self.version,
            SourceSelection::Head => HEAD_VERSION,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_path_segment("package name", &self.name)?;
        validate_path_segment("package version", &self.version)?;
        if self.url.trim().is_empty() {
            return Err(KilnError::ValidationError(format!(
                "{} has an empty source url",
                self.name
            )));
        }
        validate_sha256(&self.name, &self.sha256)?;
        if let Some(head) = &self.head {
            if head.url.trim().is_empty() {
                return Err(KilnError::ValidationError(format!(
                    "{} has an empty head url",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Names and versions become directory names under the Cellar.
pub(crate) fn validate_path_segment(what: &str, value: &str) -> Result<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.chars().any(char::is_whitespace);
    if bad {
        return Err(KilnError::ValidationError(format!(
            "invalid {what} '{value}'"
        )));
    }
    Ok(())
}

pub(crate) fn validate_sha256(owner: &str, sha256: &str) -> Result<()> {
    if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KilnError::ValidationError(format!(
            "{owner} has an invalid sha256 '{sha256}' (expected 64 hex digits)"
        )));
    }
    Ok(())
}
