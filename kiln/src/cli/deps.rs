// kiln/src/cli/deps.rs
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use kiln_common::error::{KilnError, Result};
use kiln_common::model::{Dependency, DependencyExt};

use super::load_recipe;

#[derive(Args, Debug)]
pub struct Deps {
    /// Path to the recipe file
    pub recipe: PathBuf,

    /// Report whether each build dependency is available on PATH
    #[arg(long)]
    pub check: bool,
}

impl Deps {
    pub fn run(&self) -> Result<()> {
        let recipe = load_recipe(&self.recipe)?;
        let deps = &recipe.dependencies;
        if deps.is_empty() {
            println!("{} declares no dependencies", recipe.package.name);
            return Ok(());
        }

        let build = deps.build_time();
        let runtime = deps.runtime();
        let mut missing = 0;

        if !build.is_empty() {
            println!("{}", "Build:".bold());
            for dep in build {
                if self.check {
                    let found = is_on_path(dep);
                    if !found {
                        missing += 1;
                    }
                    let mark = if found { "✔".green() } else { "✘".red() };
                    println!("  {} {}", mark, dep.name);
                } else {
                    println!("  {}", dep.name);
                }
            }
        }
        if !runtime.is_empty() {
            println!("{}", "Runtime:".bold());
            for dep in runtime {
                println!("  {} ({})", dep.name, dep.kind);
            }
        }

        if missing > 0 {
            return Err(KilnError::Generic(format!(
                "{missing} build dependencies of {} are not on PATH",
                recipe.package.name
            )));
        }
        Ok(())
    }
}

fn is_on_path(dep: &Dependency) -> bool {
    which::which(dep.provided_by()).is_ok()
}
