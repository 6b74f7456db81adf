// kiln-core/src/install.rs
//! The installation pipeline for one package.
//!
//! Order of work: validate the plan, apply the environment overlay, acquire the
//! primary source, verify every resource, stage them in declaration order, run
//! the build and write the receipt. The first error aborts the install and is returned as is.
use std::fs;
use std::path::{Path, PathBuf};

use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use kiln_common::model::{
    validate_resources, BuildSpec, Dependency, DependencyExt, EnvironmentOverlay,
    PackageDescriptor, Resource, ResolvedSource, SourceSelection,
};
use kiln_common::Recipe;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::build::{run_build, system_for, BuildContext, BuildSystem};
use crate::env::BuildEnvironment;
use crate::extract::{determine_source_root, extract_archive_async};
use crate::process::CommandRunner;
use crate::receipt::{BuiltOn, InstallReceipt, ReceiptSource};
use crate::stage::{fetch_resource, stage_resource, StageContext};
use crate::template::TemplateVars;

/// Everything one install needs, borrowed from a recipe or assembled by hand.
#[derive(Debug, Clone, Copy)]
pub struct InstallPlan<'a> {
    pub package: &'a PackageDescriptor,
    pub dependencies: &'a [Dependency],
    pub environment: &'a EnvironmentOverlay,
    pub resources: &'a [Resource],
    pub build: &'a BuildSpec,
}

impl<'a> From<&'a Recipe> for InstallPlan<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            package: &recipe.package,
            dependencies: &recipe.dependencies,
            environment: &recipe.environment,
            resources: &recipe.resources,
            build: &recipe.build,
        }
    }
}

impl InstallPlan<'_> {
    pub fn validate(&self) -> Result<()> {
        self.package.validate()?;
        self.build.validate()?;
        validate_resources(self.resources)?;
        self.environment.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub source: SourceSelection,
    /// Replace an existing, non-empty prefix.
    pub force: bool,
    pub keep_build_dir: bool,
    pub clean_env: bool,
}

impl InstallOptions {
    /// Defaults taken from the environment-derived configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            source: SourceSelection::Stable,
            force: false,
            keep_build_dir: config.keep_build_dirs,
            clean_env: config.clean_env,
        }
    }
}

/// Installs `plan` with the build system its build spec names and returns the prefix.
pub async fn install(plan: InstallPlan<'_>, config: &Config, options: InstallOptions) -> Result<PathBuf> {
    let system = system_for(plan.build)?;
    install_with(plan, config, options, system.as_ref()).await
}

/// Like [`install`], with the build system supplied by the caller.
pub async fn install_with(
    plan: InstallPlan<'_>,
    config: &Config,
    options: InstallOptions,
    system: &dyn BuildSystem,
) -> Result<PathBuf> {
    plan.validate()?;
    let package = plan.package;
    let name = package.name();
    let source = package.resolve_source(options.source)?;
    let version = package.install_version(options.source);
    let prefix = config.package_prefix(name, version);

    info!(
        "Installing {} {} from {} into {}",
        name,
        version,
        source.url(),
        prefix.display()
    );
    prepare_prefix(&prefix, options.force)?;
    log_dependencies(name, plan.dependencies);

    let template = TemplateVars::for_install(name, version, &prefix);
    let mut build_env = BuildEnvironment::for_config(config, options.clean_env);
    build_env.apply_overlay(plan.environment, &template);

    let tmp_dir = config.tmp_dir();
    fs::create_dir_all(&tmp_dir)?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("{name}-"))
        .tempdir_in(&tmp_dir)?;
    debug!("Working directory: {}", work_dir.path().display());

    let log_dir = config.package_logs_dir(name, version);
    if log_dir.exists() {
        fs::remove_dir_all(&log_dir)?;
    }
    let runner = CommandRunner::new(&build_env, Some(log_dir));

    let pipeline = Pipeline {
        plan,
        config,
        system,
        runner: &runner,
        template: &template,
        prefix: &prefix,
        version,
        work_dir: work_dir.path(),
    };
    let result = pipeline.run(&source).await;
    release_work_dir(work_dir, options.keep_build_dir);
    result.map(|_| prefix)
}

struct Pipeline<'a> {
    plan: InstallPlan<'a>,
    config: &'a Config,
    system: &'a dyn BuildSystem,
    runner: &'a CommandRunner<'a>,
    template: &'a TemplateVars,
    prefix: &'a Path,
    version: &'a str,
    work_dir: &'a Path,
}

impl Pipeline<'_> {
    async fn run(&self, source: &ResolvedSource) -> Result<()> {
        let name = self.plan.package.name();
        let downloads_dir = self.config.downloads_dir();

        let (source_root, receipt_source) = self.acquire_source(source, &downloads_dir).await?;
        debug!("Source root: {}", source_root.display());
        fs::create_dir_all(self.prefix)?;

        // Every resource is verified before any of them touches the prefix.
        let mut archives = Vec::with_capacity(self.plan.resources.len());
        for resource in self.plan.resources {
            info!("Fetching resource {} for {}", resource.name(), name);
            archives.push(fetch_resource(resource, &downloads_dir).await?);
        }

        let stage_ctx = StageContext {
            runner: self.runner,
            template: self.template,
            work_dir: self.work_dir,
        };
        for (resource, archive) in self.plan.resources.iter().zip(&archives) {
            info!("Staging resource {} for {}", resource.name(), name);
            stage_resource(resource, archive, &stage_ctx).await?;
        }

        let build_ctx = BuildContext::new(self.plan.build, &source_root, self.prefix, self.template)?;
        run_build(self.system, &build_ctx, self.runner).await?;

        InstallReceipt {
            name: name.to_string(),
            version: self.version.to_string(),
            time: chrono::Utc::now(),
            source: receipt_source,
            dependencies: self.plan.dependencies.to_vec(),
            resources: self
                .plan
                .resources
                .iter()
                .map(|r| r.descriptor.clone())
                .collect(),
            build_system: self.system.name().to_string(),
            built_on: BuiltOn::current(),
        }
        .write(self.prefix)?;
        info!("Installed {} {}", name, self.version);
        Ok(())
    }

    /// Fetches, verifies and unpacks (or checks out) the primary source and
    /// returns its root directory.
    async fn acquire_source(
        &self,
        source: &ResolvedSource,
        downloads_dir: &Path,
    ) -> Result<(PathBuf, ReceiptSource)> {
        let name = self.plan.package.name();
        let src_dir = self.work_dir.join("src");
        match source {
            ResolvedSource::Archive {
                url,
                sha256,
                mirrors,
            } => {
                info!("Fetching {} from {}", name, url);
                let archive =
                    kiln_net::fetch_archive(name, url, sha256, mirrors, downloads_dir).await?;
                extract_archive_async(&archive, &src_dir).await?;
                let root = src_dir.join(determine_source_root(&src_dir)?);
                Ok((
                    root,
                    ReceiptSource::Archive {
                        url: url.clone(),
                        sha256: sha256.to_ascii_lowercase(),
                    },
                ))
            }
            ResolvedSource::Head { url, branch } => {
                info!("Checking out head of {} from {}", name, url);
                let commit = kiln_net::checkout_head(url, branch.as_deref(), &src_dir).await?;
                Ok((
                    src_dir,
                    ReceiptSource::Head {
                        url: url.clone(),
                        commit,
                    },
                ))
            }
        }
    }
}

/// Refuses a non-empty prefix unless `force`, in which case it is removed.
fn prepare_prefix(prefix: &Path, force: bool) -> Result<()> {
    if !prefix.exists() {
        return Ok(());
    }
    let occupied = fs::read_dir(prefix)?.next().is_some();
    if !occupied {
        return Ok(());
    }
    if !force {
        return Err(KilnError::InstallError(format!(
            "{} is already installed; use --force to reinstall",
            prefix.display()
        )));
    }
    warn!("Removing existing prefix {}", prefix.display());
    fs::remove_dir_all(prefix)?;
    Ok(())
}

fn log_dependencies(name: &str, dependencies: &[Dependency]) {
    if dependencies.is_empty() {
        debug!("{} declares no dependencies", name);
        return;
    }
    for dep in dependencies {
        debug!("{} depends on {} ({})", name, dep.name, dep.kind);
    }
    let build_only: Vec<&str> = dependencies
        .build_time()
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    if !build_only.is_empty() {
        info!("Build-only dependencies of {}: {}", name, build_only.join(", "));
    }
}

fn release_work_dir(work_dir: TempDir, keep: bool) {
    if keep {
        let kept = work_dir.keep();
        info!("Keeping working directory {}", kept.display());
    } else if let Err(e) = work_dir.close() {
        warn!("Failed to remove working directory: {}", e);
    }
}
