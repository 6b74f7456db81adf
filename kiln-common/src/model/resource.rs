use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::command::CommandSpec;
use super::package::{validate_path_segment, validate_sha256};
use crate::error::{KilnError, Result};

/// An auxiliary source component staged and installed alongside the primary package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub url: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
}

/// A resource paired with the staging action that installs it.
///
/// The action is an ordered list of commands run from the resource's unpacked
/// source root; the first one to exit non-zero fails the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(flatten)]
    pub descriptor: ResourceDescriptor,
    pub stage: Vec<CommandSpec>,
}

impl Resource {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn validate(&self) -> Result<()> {
        validate_path_segment("resource name", &self.descriptor.name)?;
        if self.descriptor.url.trim().is_empty() {
            return Err(KilnError::ValidationError(format!(
                "resource {} has an empty url",
                self.descriptor.name
            )));
        }
        validate_sha256(
            &format!("resource {}", self.descriptor.name),
            &self.descriptor.sha256,
        )?;
        if self.stage.is_empty() {
            return Err(KilnError::ValidationError(format!(
                "resource {} has no staging commands",
                self.descriptor.name
            )));
        }
        Ok(())
    }
}

/// Validates each resource and rejects names declared more than once.
pub fn validate_resources(resources: &[Resource]) -> Result<()> {
    let mut seen = HashSet::new();
    for resource in resources {
        resource.validate()?;
        if !seen.insert(resource.name()) {
            return Err(KilnError::ValidationError(format!(
                "resource '{}' is declared more than once",
                resource.name()
            )));
        }
    }
    Ok(())
}
