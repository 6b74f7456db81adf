use std::path::Path;

use kiln_common::model::CommandSpec;

use super::{BuildContext, BuildSystem, PlannedCommand};

/// Out-of-tree CMake configure followed by `make install`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CMake;

impl BuildSystem for CMake {
    fn name(&self) -> &str {
        "cmake"
    }

    fn standard_args(&self, prefix: &Path) -> Vec<String> {
        vec![
            format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display()),
            "-DCMAKE_INSTALL_LIBDIR=lib".to_string(),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
            "-DCMAKE_FIND_FRAMEWORK=LAST".to_string(),
            "-DCMAKE_VERBOSE_MAKEFILE=ON".to_string(),
            "-Wno-dev".to_string(),
        ]
    }

    fn configure(&self, ctx: &BuildContext) -> PlannedCommand {
        let mut args = vec![ctx.source_dir.to_string_lossy().to_string()];
        args.extend(self.standard_args(&ctx.prefix));
        args.extend(ctx.extra_args.iter().cloned());
        PlannedCommand {
            command: CommandSpec::new("cmake", args),
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
