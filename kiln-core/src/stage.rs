// kiln-core/src/stage.rs
//! Resource staging: fetch and verify archives, then unpack each into a
//! throwaway directory and run the resource's own install steps against the
//! parent prefix.
use std::path::{Path, PathBuf};

use kiln_common::error::{KilnError, Result};
use kiln_common::model::Resource;
use tracing::{debug, error};

use crate::extract::{determine_source_root, extract_archive_async};
use crate::process::CommandRunner;
use crate::template::TemplateVars;

pub struct StageContext<'a> {
    pub runner: &'a CommandRunner<'a>,
    pub template: &'a TemplateVars,
    /// Parent of the per-resource staging directories.
    pub work_dir: &'a Path,
}

/// Fetches and verifies a resource's archive into the download cache.
pub async fn fetch_resource(resource: &Resource, downloads_dir: &Path) -> Result<PathBuf> {
    let descriptor = &resource.descriptor;
    debug!("Fetching resource: {}", descriptor.name);
    kiln_net::fetch_archive(
        &descriptor.name,
        &descriptor.url,
        &descriptor.sha256,
        &descriptor.mirrors,
        downloads_dir,
    )
    .await
}

/// Stages one resource from its already verified `archive`. The staging
/// directory is removed whether or not the steps succeed.
pub async fn stage_resource(
    resource: &Resource,
    archive: &Path,
    ctx: &StageContext<'_>,
) -> Result<()> {
    let descriptor = &resource.descriptor;
    debug!("Staging resource: {}", descriptor.name);

    let stage_dir = tempfile::Builder::new()
        .prefix(&format!("{}-stage-", descriptor.name))
        .tempdir_in(ctx.work_dir)?;
    extract_archive_async(archive, stage_dir.path()).await?;
    let source_root = stage_dir.path().join(determine_source_root(stage_dir.path())?);
    let template = ctx.template.clone().with_path("stage_dir", &source_root);

    for step in &resource.stage {
        let step = template.expand_command(step);
        debug!("   -> [{}] {}", descriptor.name, step);
        let status = ctx.runner.run(&step, &source_root).await?;
        if !status.success() {
            error!(
                "Staging step for resource '{}' failed with status {}",
                descriptor.name, status
            );
            return Err(KilnError::ResourceInstall {
                resource: descriptor.name.clone(),
                exit_code: status.code(),
            });
        }
    }
    debug!("Resource '{}' staged", descriptor.name);
    Ok(())
}
