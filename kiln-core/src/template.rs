//! `{placeholder}` expansion for recipe-supplied values and commands.
use std::collections::BTreeMap;
use std::path::Path;

use kiln_common::model::CommandSpec;

/// Subdirectory of the prefix that receives staged resources.
pub const LIBEXEC_DIR: &str = "libexec";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    vars: BTreeMap<String, String>,
}

impl TemplateVars {
    /// `{name}`, `{version}`, `{prefix}` and `{libexec}` for one install.
    pub fn for_install(name: &str, version: &str, prefix: &Path) -> Self {
        Self::default()
            .with("name", name)
            .with("version", version)
            .with_path("prefix", prefix)
            .with_path("libexec", &prefix.join(LIBEXEC_DIR))
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_path(self, key: &str, value: &Path) -> Self {
        let value = value.to_string_lossy().to_string();
        self.with(key, &value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Replaces every `{key}` with a known key; anything else is left untouched.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => match self.vars.get(&after[..end]) {
                    Some(value) => {
                        out.push_str(value);
                        rest = &after[end + 1..];
                    }
                    None => {
                        out.push('{');
                        rest = after;
                    }
                },
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    pub fn expand_command(&self, command: &CommandSpec) -> CommandSpec {
        CommandSpec {
            program: self.expand(&command.program),
            args: command.args.iter().map(|a| self.expand(a)).collect(),
        }
    }
}
