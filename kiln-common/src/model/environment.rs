use serde::{Deserialize, Serialize};

use crate::error::{KilnError, Result};

/// How an overlay entry is merged into an existing variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// `value<sep>existing`, or just `value` when the variable is unset.
    #[default]
    PrependCreatePath,
    /// `existing<sep>value`, or just `value` when the variable is unset.
    AppendPath,
    /// Replace whatever is there.
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub strategy: MergeStrategy,
}

impl EnvEntry {
    pub fn prepend_create_path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            strategy: MergeStrategy::PrependCreatePath,
        }
    }
}

/// Ordered environment changes applied to an install's subprocesses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentOverlay(pub Vec<EnvEntry>);

impl EnvironmentOverlay {
    pub fn new(entries: Vec<EnvEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every entry must name a variable a child process can actually receive.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.0 {
            if entry.name.is_empty() || entry.name.contains('=') || entry.name.contains('\0') {
                return Err(KilnError::ValidationError(format!(
                    "invalid environment variable name '{}'",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}
