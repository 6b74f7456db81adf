// kiln/src/cli/install.rs
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use kiln_common::model::SourceSelection;
use kiln_core::{install, InstallOptions, InstallPlan};
use tracing::{instrument, warn};

use super::{load_recipe, status};

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    #[arg(long, help = "Build from the head (version control) source")]
    pub head: bool,

    #[arg(long, help = "Replace an existing installation of the same version")]
    pub force: bool,

    #[arg(long, help = "Keep the temporary working directory after the install")]
    pub keep_tmp: bool,

    #[arg(
        long,
        help = "Start builds from a minimal environment instead of inheriting this shell's"
    )]
    pub clean_env: bool,
}

impl InstallArgs {
    fn options(&self, config: &Config) -> InstallOptions {
        let mut options = InstallOptions::from_config(config);
        if self.head {
            options.source = SourceSelection::Head;
        }
        options.force = self.force;
        options.keep_build_dir |= self.keep_tmp;
        options.clean_env |= self.clean_env;
        options
    }

    #[instrument(skip(self, config), fields(recipe = %self.recipe.display()))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = load_recipe(&self.recipe)?;
        let options = self.options(config);
        let package = &recipe.package;
        let version = package.install_version(options.source);
        status(&format!("Installing {} {}", package.name, version));

        let started = Instant::now();
        let outcome = tokio::select! {
            result = install(InstallPlan::from(&recipe), config, options) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; the running build step has been stopped");
                Err(KilnError::Generic(format!(
                    "Installation of {} cancelled",
                    package.name
                )))
            }
        };
        let prefix = outcome?;

        let elapsed = Duration::from_secs(started.elapsed().as_secs());
        status(&format!(
            "{} {} installed to {} ({})",
            package.name,
            version,
            prefix.display(),
            humantime::format_duration(elapsed)
        ));
        Ok(())
    }
}
