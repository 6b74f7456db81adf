use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// The two subprocess phases of a primary package build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Configure,
    BuildInstall,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => f.write_str("configure"),
            Self::BuildInstall => f.write_str("build+install"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum KilnError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Recipe Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Git Error: {0}")]
    Git(#[from] Arc<git2::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("Integrity check failed for '{name}': expected sha256 {expected}, got {actual}")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Resource '{resource}' failed to install ({})", describe_exit(.exit_code))]
    ResourceInstall {
        resource: String,
        exit_code: Option<i32>,
    },

    #[error("Build failed during {phase} phase ({})", describe_exit(.exit_code))]
    Build {
        phase: BuildPhase,
        exit_code: Option<i32>,
    },

    #[error("Build environment error: {0}")]
    Environment(String),

    #[error("Extraction Error: {0}")]
    Extract(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl KilnError {
    /// Exit code of the failed subprocess, for the stage errors that carry one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ResourceInstall { exit_code, .. } | Self::Build { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Name of the install stage this error originated from, if it is one of the
    /// staged-install errors.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Integrity { .. } => Some("verify"),
            Self::ResourceInstall { .. } => Some("stage"),
            Self::Build {
                phase: BuildPhase::Configure,
                ..
            } => Some("configure"),
            Self::Build {
                phase: BuildPhase::BuildInstall,
                ..
            } => Some("build+install"),
            Self::Environment(_) => Some("environment"),
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl From<std::io::Error> for KilnError {
    fn from(err: std::io::Error) -> Self {
        KilnError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for KilnError {
    fn from(err: reqwest::Error) -> Self {
        KilnError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::Toml(Arc::new(err))
    }
}

impl From<git2::Error> for KilnError {
    fn from(err: git2::Error) -> Self {
        KilnError::Git(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, KilnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_reports_phase_and_code() {
        let err = KilnError::Build {
            phase: BuildPhase::Configure,
            exit_code: Some(2),
        };
        assert_eq!(
            err.to_string(),
            "Build failed during configure phase (exit code 2)"
        );
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(err.stage(), Some("configure"));
    }

    #[test]
    fn signal_termination_has_no_exit_code() {
        let err = KilnError::ResourceInstall {
            resource: "pyusb".into(),
            exit_code: None,
        };
        assert_eq!(
            err.to_string(),
            "Resource 'pyusb' failed to install (terminated by signal)"
        );
        assert_eq!(err.exit_code(), None);
    }
}
