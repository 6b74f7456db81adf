// kiln/src/cli/info.rs
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use kiln_common::config::Config;
use kiln_common::error::Result;
use kiln_common::model::SourceSelection;
use kiln_common::Recipe;

use super::load_recipe;

#[derive(Args, Debug)]
pub struct Info {
    /// Path to the recipe file
    pub recipe: PathBuf,
}

impl Info {
    pub fn run(&self, config: &Config) -> Result<()> {
        let recipe = load_recipe(&self.recipe)?;
        print_recipe_info(&recipe, config);
        Ok(())
    }
}

fn print_recipe_info(recipe: &Recipe, config: &Config) {
    let package = &recipe.package;
    println!("{} {}", package.name.bold(), package.version);
    println!(
        "Homepage: {}",
        package.homepage.as_deref().unwrap_or("N/A")
    );
    println!("Source: {}", package.url);
    if let Some(head) = &package.head {
        match &head.branch {
            Some(branch) => println!("Head: {} ({})", head.url, branch),
            None => println!("Head: {}", head.url),
        }
    }

    println!("\nBuild:");
    println!("  system: {}", recipe.build.system);
    if let Some(subdir) = &recipe.build.source_subdir {
        println!("  source subdir: {}", subdir.display());
    }
    if !recipe.build.args.is_empty() {
        println!("  extra args: {}", recipe.build.args.join(" "));
    }

    if !recipe.dependencies.is_empty() {
        println!("\nDependencies:");
        for dep in &recipe.dependencies {
            println!("  - {} ({})", dep.name, dep.kind);
        }
    }

    if !recipe.resources.is_empty() {
        println!("\nResources:");
        for resource in &recipe.resources {
            println!("  - {}: {}", resource.name(), resource.descriptor.url);
        }
    }

    if !recipe.environment.is_empty() {
        println!("\nBuild environment:");
        for entry in recipe.environment.entries() {
            println!("  {} ({:?}) {}", entry.name, entry.strategy, entry.value);
        }
    }

    println!();
    for selection in [SourceSelection::Stable, SourceSelection::Head] {
        if selection == SourceSelection::Head && package.head.is_none() {
            continue;
        }
        let version = package.install_version(selection);
        let prefix = config.package_prefix(&package.name, version);
        if prefix.is_dir() {
            println!("{} {}", "Installed:".green(), prefix.display());
        } else {
            println!("{} {}", "Not installed:".yellow(), version);
        }
    }
}
