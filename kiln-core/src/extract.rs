// kiln-core/src/extract.rs
//! Unpacking of verified source archives into a staging directory.
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use kiln_common::error::{KilnError, Result};
use tar::Archive;
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::read::ZipArchive;

const SUPPORTED_ARCHIVE_TYPES: &[&str] = &["gz", "tgz", "bz2", "tbz", "tbz2", "xz", "txz", "tar", "zip"];

/// Detects the archive format from its magic bytes, falling back to the extension.
pub fn determine_archive_type(archive_path: &Path) -> Result<&'static str> {
    let detected = match infer::get_from_path(archive_path)? {
        Some(kind) => kind.extension(),
        None => archive_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or(""),
    };
    SUPPORTED_ARCHIVE_TYPES
        .iter()
        .find(|&&s| s == detected)
        .copied()
        .ok_or_else(|| {
            KilnError::Extract(format!(
                "Unsupported archive type '{}' for {}",
                detected,
                archive_path.display()
            ))
        })
}

/// Detects the archive type and unpacks on a blocking thread.
pub async fn extract_archive_async(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let archive_type = determine_archive_type(&archive_path)?;
        extract_archive(&archive_path, &target_dir, archive_type)
    })
    .await
    .map_err(|e| KilnError::Generic(format!("JoinError in archive extraction: {e}")))?
}

pub fn extract_archive(archive_path: &Path, target_dir: &Path, archive_type: &str) -> Result<()> {
    debug!(
        "Extracting archive '{}' (type: {}) to '{}'",
        archive_path.display(),
        archive_type,
        target_dir.display()
    );
    fs::create_dir_all(target_dir)?;
    let file = File::open(archive_path).map_err(|e| {
        KilnError::Extract(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    match archive_type {
        "zip" => extract_zip_archive(file, target_dir, archive_path),
        "gz" | "tgz" => extract_tar_archive(GzDecoder::new(file), target_dir, archive_path),
        "bz2" | "tbz" | "tbz2" => extract_tar_archive(BzDecoder::new(file), target_dir, archive_path),
        "xz" | "txz" => extract_tar_archive(XzDecoder::new(file), target_dir, archive_path),
        "tar" => extract_tar_archive(file, target_dir, archive_path),
        other => Err(KilnError::Extract(format!(
            "Unsupported archive type provided for extraction: '{}' for file {}",
            other,
            archive_path.display()
        ))),
    }
}

fn extract_tar_archive<R: Read>(reader: R, target_dir: &Path, archive_path: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut errors: Vec<String> = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| KilnError::Extract(format!("Failed to read {}: {}", archive_path.display(), e)))?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            KilnError::Extract(format!(
                "Error reading TAR entry from {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let entry_path = entry
            .path()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| PathBuf::from("<invalid path>"));

        // unpack_in refuses entries that would land outside target_dir.
        match entry.unpack_in(target_dir) {
            Ok(true) => {}
            Ok(false) => {
                let msg = format!(
                    "Path traversal in TAR entry {} of {}",
                    entry_path.display(),
                    archive_path.display()
                );
                error!("{}", msg);
                errors.push(msg);
            }
            Err(e) => {
                let msg = format!("Failed to unpack entry {}: {}", entry_path.display(), e);
                error!("{}", msg);
                errors.push(msg);
            }
        }
    }

    if !errors.is_empty() {
        return Err(KilnError::Extract(format!(
            "Failed during TAR extraction for {} with {} error(s): {}",
            archive_path.display(),
            errors.len(),
            errors.join("; ")
        )));
    }
    debug!("Finished TAR extraction for {}", archive_path.display());
    Ok(())
}

fn extract_zip_archive<R: Read + Seek>(reader: R, target_dir: &Path, archive_path: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(reader).map_err(|e| {
        KilnError::Extract(format!("Failed to open ZIP {}: {}", archive_path.display(), e))
    })?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| {
            KilnError::Extract(format!(
                "Error reading ZIP index {} in {}: {}",
                i,
                archive_path.display(),
                e
            ))
        })?;

        let relative = match file.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                return Err(KilnError::Extract(format!(
                    "Unsafe ZIP entry name '{}' in {}",
                    file.name(),
                    archive_path.display()
                )));
            }
        };
        let out_path = target_dir.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if file.is_symlink() {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            let link_target = PathBuf::from(String::from_utf8_lossy(&buf).to_string());
            #[cfg(unix)]
            {
                if out_path.symlink_metadata().is_ok() {
                    fs::remove_file(&out_path)?;
                }
                std::os::unix::fs::symlink(&link_target, &out_path)?;
            }
            #[cfg(not(unix))]
            warn!(
                "Cannot create symlink on non-unix system: {} -> {}",
                out_path.display(),
                link_target.display()
            );
            continue;
        }

        let mut out_file = File::create(&out_path)?;
        io::copy(&mut file, &mut out_file)?;
        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }
    debug!("Finished ZIP extraction for {}", archive_path.display());
    Ok(())
}

/// The directory sources live in after extraction, relative to `extract_dir`:
/// the single top-level directory if that is all there is, otherwise `.`.
pub fn determine_source_root(extract_dir: &Path) -> Result<PathBuf> {
    let mut subdirs: Vec<PathBuf> = Vec::new();
    let mut has_files = false;
    let entries = fs::read_dir(extract_dir).map_err(|e| {
        KilnError::Extract(format!(
            "Failed to read extraction dir {}: {}",
            extract_dir.display(),
            e
        ))
    })?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(PathBuf::from(file_name));
        } else {
            has_files = true;
        }
    }

    if subdirs.len() == 1 && !has_files {
        let root = subdirs.remove(0);
        debug!("Source root appears to be single subdirectory: {}", root.display());
        Ok(root)
    } else {
        if subdirs.is_empty() && !has_files {
            warn!("Extraction dir {} is empty", extract_dir.display());
        }
        Ok(PathBuf::from("."))
    }
}

/// Joins a recipe-relative subdirectory onto `root`, refusing anything that escapes it.
pub fn join_within(root: &Path, relative: &Path) -> Result<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(p) => joined.push(p),
            Component::CurDir => {}
            _ => {
                return Err(KilnError::ValidationError(format!(
                    "Path '{}' must stay inside {}",
                    relative.display(),
                    root.display()
                )));
            }
        }
    }
    Ok(joined)
}
