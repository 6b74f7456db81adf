// kiln-core/src/build/mod.rs
//! Build invocation for the primary package.
//!
//! A [`BuildSystem`] only plans the two commands of a build (configure, then
//! build+install); [`run_build`] creates the build directory and executes the
//! plan through a [`CommandRunner`], mapping failures to [`KilnError::Build`].

pub mod autotools;
pub mod cmake;
pub mod custom;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_common::error::{BuildPhase, KilnError, Result};
use kiln_common::model::{BuildSpec, BuildSystemKind, CommandSpec};
use tracing::{debug, error, info};

pub use self::autotools::Autotools;
pub use self::cmake::CMake;
pub use self::custom::Custom;
use crate::extract::join_within;
use crate::process::CommandRunner;
use crate::template::TemplateVars;

/// Where a build happens and what it installs into.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub prefix: PathBuf,
    /// The directory holding the package's top-level build file.
    pub source_dir: PathBuf,
    /// Fresh directory the commands run in, below `source_dir`.
    pub build_dir: PathBuf,
    /// Package-specific arguments, appended after the standard ones.
    pub extra_args: Vec<String>,
    pub template: TemplateVars,
}

impl BuildContext {
    pub fn new(
        spec: &BuildSpec,
        source_root: &Path,
        prefix: &Path,
        template: &TemplateVars,
    ) -> Result<Self> {
        let source_dir = match &spec.source_subdir {
            Some(subdir) => join_within(source_root, subdir)?,
            None => source_root.to_path_buf(),
        };
        let build_dir = join_within(&source_dir, Path::new(&spec.build_dir))?;
        let template = template
            .clone()
            .with_path("source_dir", &source_dir)
            .with_path("build_dir", &build_dir);
        Ok(Self {
            prefix: prefix.to_path_buf(),
            source_dir,
            build_dir,
            extra_args: spec.args.clone(),
            template,
        })
    }
}

/// A command together with the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub command: CommandSpec,
    pub cwd: PathBuf,
}

pub trait BuildSystem: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Arguments every configuration run of this system receives, before the
    /// package-specific extras.
    fn standard_args(&self, prefix: &Path) -> Vec<String>;

    fn configure(&self, ctx: &BuildContext) -> PlannedCommand;

    fn build_and_install(&self, ctx: &BuildContext) -> PlannedCommand;
}

/// The build system a recipe's `[build]` table asks for.
pub fn system_for(spec: &BuildSpec) -> Result<Box<dyn BuildSystem>> {
    match spec.system {
        BuildSystemKind::Cmake => Ok(Box::new(CMake)),
        BuildSystemKind::Autotools => Ok(Box::new(Autotools)),
        BuildSystemKind::Custom => match (&spec.configure, &spec.install) {
            (Some(configure), Some(install)) => {
                Ok(Box::new(Custom::new(configure.clone(), install.clone())))
            }
            _ => Err(KilnError::ValidationError(
                "custom builds need both a configure and an install command".to_string(),
            )),
        },
    }
}

/// Runs configure, then build+install, in a freshly created build directory.
///
/// build+install is never started when configure fails. Nothing written to the
/// prefix is rolled back on failure.
pub async fn run_build(
    system: &dyn BuildSystem,
    ctx: &BuildContext,
    runner: &CommandRunner<'_>,
) -> Result<()> {
    if ctx.build_dir.exists() {
        debug!("Removing stale build dir {}", ctx.build_dir.display());
        fs::remove_dir_all(&ctx.build_dir)?;
    }
    fs::create_dir_all(&ctx.build_dir)?;

    info!(
        "Configuring with {} in {}",
        system.name(),
        ctx.build_dir.display()
    );
    run_phase(BuildPhase::Configure, system.configure(ctx), runner).await?;

    info!("Building and installing into {}", ctx.prefix.display());
    run_phase(BuildPhase::BuildInstall, system.build_and_install(ctx), runner).await
}

async fn run_phase(
    phase: BuildPhase,
    planned: PlannedCommand,
    runner: &CommandRunner<'_>,
) -> Result<()> {
    debug!("[{}] {}", phase, planned.command);
    let status = runner.run(&planned.command, &planned.cwd).await?;
    if status.success() {
        Ok(())
    } else {
        error!("{} phase failed with status {}", phase, status);
        Err(KilnError::Build {
            phase,
            exit_code: status.code(),
        })
    }
}

/// `--prefix=<prefix>`, shared by configure-script style systems.
pub(crate) fn prefix_arg(prefix: &Path) -> String {
    format!("--prefix={}", prefix.display())
}
