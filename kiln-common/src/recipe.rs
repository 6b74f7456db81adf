// kiln-common/src/recipe.rs
//! TOML recipes: one file describes everything needed to install one package.
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KilnError, Result};
use crate::model::{
    validate_resources, BuildSpec, Dependency, EnvironmentOverlay, PackageDescriptor, Resource,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub package: PackageDescriptor,
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, rename = "env")]
    pub environment: EnvironmentOverlay,
    #[serde(default, rename = "resource")]
    pub resources: Vec<Resource>,
    pub build: BuildSpec,
}

impl Recipe {
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!("Loading recipe from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            KilnError::Config(format!("Failed to read recipe {}: {}", path.display(), e))
        })?;
        text.parse()
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.package.validate()?;
        self.build.validate()?;
        validate_resources(&self.resources)?;
        self.environment.validate()
    }
}

impl FromStr for Recipe {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(s)?;
        recipe.validate()?;
        Ok(recipe)
    }
}
