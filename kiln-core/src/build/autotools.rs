use std::path::Path;

use kiln_common::model::CommandSpec;

use super::{prefix_arg, BuildContext, BuildSystem, PlannedCommand};

/// `configure && make install`, configured from the build directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autotools;

impl BuildSystem for Autotools {
    fn name(&self) -> &str {
        "autotools"
    }

    fn standard_args(&self, prefix: &Path) -> Vec<String> {
        vec![
            "--disable-debug".to_string(),
            "--disable-dependency-tracking".to_string(),
            prefix_arg(prefix),
            format!("--libdir={}", prefix.join("lib").display()),
        ]
    }

    fn configure(&self, ctx: &BuildContext) -> PlannedCommand {
        let script = ctx.source_dir.join("configure");
        let mut args = self.standard_args(&ctx.prefix);
        args.extend(ctx.extra_args.iter().cloned());
        PlannedCommand {
            command: CommandSpec::new(script.to_string_lossy(), args),
            cwd: ctx.build_dir.clone(),
        }
    }

    fn build_and_install(&self, ctx: &BuildContext) -> PlannedCommand {
        PlannedCommand {
            command: CommandSpec::new("make", ["install"]),
            cwd: ctx.build_dir.clone(),
        }
    }
}
