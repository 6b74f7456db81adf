use std::path::Path;

use kiln_common::model::CommandSpec;

use super::{prefix_arg, BuildContext, BuildSystem, PlannedCommand};

/// Recipe-supplied configure and build+install commands.
///
/// Both commands may use `{prefix}`, `{source_dir}`, `{build_dir}` and the
/// other install placeholders.
#[derive(Debug, Clone)]
pub struct Custom {
    configure: CommandSpec,
    install: CommandSpec,
}

impl Custom {
    pub fn new(configure: CommandSpec, install: CommandSpec) -> Self {
        Self { configure, install }
    }
}

impl BuildSystem for Custom {
    fn name(&self) -> &str {
        "custom"
    }

    fn standard_args(&self, prefix: &Path) -> Vec<String> {
        vec![prefix_arg(prefix)]
    }

    fn configure(&self, ctx: &BuildContext) -> PlannedCommand {
        let mut command = ctx.template.expand_command(&self.configure);
        command.args.extend(self.standard_args(&ctx.prefix));
        command.args.extend(ctx.extra_args.iter().cloned());
        PlannedCommand {
            command,
            cwd: ctx.build_dir.clone(),
        }
    }

    fn build_and_install(&self, ctx: &BuildContext) -> PlannedCommand {
        PlannedCommand {
            command: ctx.template.expand_command(&self.install),
            cwd: ctx.build_dir.clone(),
        }
    }
}
