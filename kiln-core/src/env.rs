// kiln-core/src/env.rs
//! The installer-scoped environment handed to every build subprocess.
//!
//! The process environment of the installer itself is never modified: overlays are
//! applied to a [`BuildEnvironment`] value, and each spawned command gets exactly
//! that map (`env_clear` followed by `envs`).
use std::collections::BTreeMap;
use std::env;

use kiln_common::config::Config;
use kiln_common::model::{EnvironmentOverlay, MergeStrategy};
use tokio::process::Command;
use tracing::debug;

use crate::template::TemplateVars;

/// Separator between entries of path-like variables.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

// Ambient variables that change how interpreters and compilers find things.
const ENV_VARS_TO_REMOVE: &[&str] = &[
    "RUBYLIB", "RUBYOPT", "GEM_HOME", "GEM_PATH",
    "PYTHONHOME", "PYTHONPATH", "PYTHONSTARTUP", "PYTHONUSERBASE", "PIP_REQUIRE_VIRTUALENV",
    "PERL5LIB", "PERL_MB_OPT", "PERL_MM_OPT",
    "NODE_PATH",
    "GOPATH", "GOBIN",
    "CLASSPATH", "JAVA_TOOL_OPTIONS",
    "MAKEFLAGS", "MAKELEVEL",
    "CMAKE_PREFIX_PATH", "CMAKE_INCLUDE_PATH", "CMAKE_LIBRARY_PATH", "CMAKE_FRAMEWORK_PATH",
    "PKG_CONFIG_PATH", "PKG_CONFIG_LIBDIR",
    "CPATH", "LIBRARY_PATH", "LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH",
    "LDFLAGS", "CFLAGS", "CXXFLAGS", "CPPFLAGS",
    "CC", "CXX", "CPP", "LD",
    "GREP_OPTIONS",
];

// Variables passed through from the user's environment in sanitized mode.
const ENV_VARS_TO_KEEP: &[&str] = &[
    "PATH",
    "USER",
    "LOGNAME",
    "HOME",
    "TMPDIR",
    "TERM",
    "SHELL",
    "LANG", "LC_ALL", "LC_CTYPE",
    "TZ",
    "SDKROOT",
    "SYSTEMROOT",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Starts from the full ambient environment of the installer process.
    pub fn inherit() -> Self {
        Self::from_vars(utf8_vars())
    }

    /// Starts from an allow-listed subset of the ambient environment, dropping
    /// variables that would leak the user's toolchain setup into the build.
    pub fn sanitized() -> Self {
        let vars = utf8_vars().filter(|(key, _)| {
            if ENV_VARS_TO_REMOVE.contains(&key.as_str()) {
                debug!("Removing env var: {}", key);
                return false;
            }
            ENV_VARS_TO_KEEP.contains(&key.as_str())
        });
        Self::from_vars(vars)
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The environment an install starts from under `config`.
    pub fn for_config(config: &Config, clean_env: bool) -> Self {
        let mut build_env = if clean_env {
            Self::sanitized()
        } else {
            Self::inherit()
        };
        if build_env.get("HOME").is_none() {
            let home = config.home_dir().to_string_lossy().to_string();
            build_env.set("HOME", home);
        }
        let bin_dir = config.bin_dir();
        if bin_dir.is_dir() {
            build_env.prepend_create_path("PATH", &bin_dir.to_string_lossy());
        }
        if build_env.get("MAKEFLAGS").is_none() {
            build_env.set("MAKEFLAGS", format!("-j{}", config.make_jobs));
        }
        build_env
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// `value<sep>existing` when `name` is set, otherwise just `value`.
    /// Existing entries are kept as they are, duplicates included.
    pub fn prepend_create_path(&mut self, name: &str, value: &str) {
        let merged = match self.vars.get(name) {
            Some(existing) if !existing.is_empty() => {
                format!("{value}{PATH_SEPARATOR}{existing}")
            }
            _ => value.to_string(),
        };
        self.vars.insert(name.to_string(), merged);
    }

    /// `existing<sep>value` when `name` is set, otherwise just `value`.
    pub fn append_path(&mut self, name: &str, value: &str) {
        let merged = match self.vars.get(name) {
            Some(existing) if !existing.is_empty() => {
                format!("{existing}{PATH_SEPARATOR}{value}")
            }
            _ => value.to_string(),
        };
        self.vars.insert(name.to_string(), merged);
    }

    /// Applies each overlay entry in order, expanding placeholders in its value.
    pub fn apply_overlay(&mut self, overlay: &EnvironmentOverlay, template: &TemplateVars) {
        for entry in overlay.entries() {
            let value = template.expand(&entry.value);
            debug!(
                "Applying env overlay {} ({:?}): {}",
                entry.name, entry.strategy, value
            );
            match entry.strategy {
                MergeStrategy::PrependCreatePath => self.prepend_create_path(&entry.name, &value),
                MergeStrategy::AppendPath => self.append_path(&entry.name, &value),
                MergeStrategy::Set => self.set(entry.name.clone(), value),
            }
        }
    }

    /// The PATH subprocess programs are resolved against.
    pub fn path_var(&self) -> Option<&str> {
        self.get("PATH")
    }

    pub fn apply_to_command(&self, cmd: &mut Command) {
        cmd.env_clear();
        cmd.envs(&self.vars);
    }
}

// Non-UTF-8 variables cannot be carried in the map and are skipped.
fn utf8_vars() -> impl Iterator<Item = (String, String)> {
    env::vars_os().filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}
