use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::command::CommandSpec;
use crate::error::{KilnError, Result};

const DEFAULT_BUILD_DIR: &str = "build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildSystemKind {
    Cmake,
    Autotools,
    Custom,
}

impl fmt::Display for BuildSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmake => f.write_str("cmake"),
            Self::Autotools => f.write_str("autotools"),
            Self::Custom => f.write_str("custom"),
        }
    }
}

/// How the primary package is configured, built and installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub system: BuildSystemKind,
    /// Directory inside the unpacked source that holds the build definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_subdir: Option<PathBuf>,
    /// Name of the dedicated build directory created inside the source directory.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    /// Package-specific configuration arguments appended after the standard ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Configuration command for `custom` builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configure: Option<CommandSpec>,
    /// Build+install command for `custom` builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<CommandSpec>,
}

fn default_build_dir() -> String {
    DEFAULT_BUILD_DIR.to_string()
}

impl BuildSpec {
    pub fn new(system: BuildSystemKind) -> Self {
        Self {
            system,
            source_subdir: None,
            build_dir: default_build_dir(),
            args: Vec::new(),
            configure: None,
            install: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(subdir) = &self.source_subdir {
            if !is_relative_inside(subdir) {
                return Err(KilnError::ValidationError(format!(
                    "build source_subdir '{}' must be a relative path inside the source tree",
                    subdir.display()
                )));
            }
        }
        let build_dir = Path::new(&self.build_dir);
        let single_name = matches!(
            build_dir.components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        );
        if !single_name {
            return Err(KilnError::ValidationError(format!(
                "build_dir '{}' must be a single directory name",
                self.build_dir
            )));
        }
        match self.system {
            BuildSystemKind::Custom if self.configure.is_none() || self.install.is_none() => {
                Err(KilnError::ValidationError(
                    "custom builds need both a configure and an install command".to_string(),
                ))
            }
            BuildSystemKind::Cmake | BuildSystemKind::Autotools
                if self.configure.is_some() || self.install.is_some() =>
            {
                Err(KilnError::ValidationError(format!(
                    "configure/install commands are only allowed for custom builds, not {}",
                    self.system
                )))
            }
            _ => Ok(()),
        }
    }
}

fn is_relative_inside(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
