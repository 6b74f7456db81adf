// kiln-common/src/model/dependency.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a declared dependency is needed by an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Needed only while building (e.g. `cmake`).
    Build,
    /// A native library the installed package links against.
    RuntimeLibrary,
    /// A language runtime the installed package runs under (e.g. `python`).
    RuntimeInterpreter,
}

impl DependencyKind {
    /// Build-only dependencies may be absent from the target system after install.
    pub fn required_after_install(self) -> bool {
        !matches!(self, Self::Build)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => f.write_str("build"),
            Self::RuntimeLibrary => f.write_str("runtime-library"),
            Self::RuntimeInterpreter => f.write_str("runtime-interpreter"),
        }
    }
}

/// One entry of a package's static dependency declaration.
///
/// kiln never resolves these; the host is expected to have made each one
/// available before `install` runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
    /// What satisfies the dependency when it differs from `name`
    /// (e.g. the interpreter binary `python3` for `python`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// The name a host should look for on the target system.
    pub fn provided_by(&self) -> &str {
        self.provider.as_deref().unwrap_or(&self.name)
    }
}

pub trait DependencyExt {
    fn of_kind(&self, kind: DependencyKind) -> Vec<&Dependency>;
    fn runtime(&self) -> Vec<&Dependency>;
    fn build_time(&self) -> Vec<&Dependency>;
}

impl DependencyExt for [Dependency] {
    fn of_kind(&self, kind: DependencyKind) -> Vec<&Dependency> {
        self.iter().filter(|dep| dep.kind == kind).collect()
    }

    fn runtime(&self) -> Vec<&Dependency> {
        self.iter()
            .filter(|dep| dep.kind.required_after_install())
            .collect()
    }

    fn build_time(&self) -> Vec<&Dependency> {
        self.of_kind(DependencyKind::Build)
    }
}
