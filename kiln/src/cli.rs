// kiln/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::Path;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use kiln_common::error::Result;
use kiln_common::{Config, Recipe};

pub mod deps;
pub mod info;
pub mod install;
pub mod list;

use crate::cli::deps::Deps;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "kiln", bin_name = "kiln")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and install a package from a recipe file
    Install(InstallArgs),
    /// Show what a recipe describes
    Info(Info),
    /// Show a recipe's dependency declaration
    Deps(Deps),
    /// List installed packages
    List(List),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Info(command) => command.run(config),
            Self::Deps(command) => command.run(),
            Self::List(command) => command.run(config),
        }
    }
}

pub(crate) fn load_recipe(path: &Path) -> Result<Recipe> {
    Recipe::from_path(path)
}

pub(crate) fn status(message: &str) {
    println!("{}{}", "==> ".bold().blue(), message.bold());
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn bundled_recipe_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../recipes/ubertooth.toml");
        let recipe = load_recipe(&path).unwrap();
        assert_eq!(recipe.package.name, "ubertooth");
        assert_eq!(recipe.resources.len(), 1);
    }

    #[test]
    fn parses_install_flags() {
        let args = CliArgs::parse_from([
            "kiln", "-vv", "install", "ubertooth.toml", "--head", "--force", "--keep-tmp",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Install(install) => {
                assert!(install.head);
                assert!(install.force);
                assert!(install.keep_tmp);
                assert!(!install.clean_env);
                assert_eq!(install.recipe, Path::new("ubertooth.toml"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
