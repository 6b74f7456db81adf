// kiln-common/src/config.rs
use std::env;
use std::path::PathBuf;

use directories::UserDirs;
use tracing::debug;

use super::error::Result;

// Fallback used when KILN_PREFIX is not set or is empty.
const DEFAULT_FALLBACK_KILN_ROOT: &str = "/opt/kiln";

#[derive(Debug, Clone)]
pub struct Config {
    pub kiln_root: PathBuf,
    /// Overrides `<kiln_root>/cache` when set.
    pub cache_root: Option<PathBuf>,
    /// Parallel jobs forwarded to make through MAKEFLAGS.
    pub make_jobs: usize,
    /// Start builds from an allow-listed environment instead of the full ambient one.
    pub clean_env: bool,
    /// Keep per-install working directories after the install finishes.
    pub keep_build_dirs: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading kiln configuration");

        let kiln_root_str = env::var("KILN_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "KILN_PREFIX environment variable not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_KILN_ROOT
                );
                DEFAULT_FALLBACK_KILN_ROOT.to_string()
            });
        let kiln_root = PathBuf::from(&kiln_root_str);
        debug!("Effective KILN_ROOT set to: {}", kiln_root.display());

        let cache_root = env::var("KILN_CACHE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let make_jobs = match env::var("KILN_MAKE_JOBS") {
            Ok(raw) => parse_make_jobs(&raw)?,
            Err(_) => num_cpus::get(),
        };

        let clean_env = env::var("KILN_CLEAN_ENV").is_ok_and(|v| v == "1");
        let keep_build_dirs = env::var("KILN_NO_CLEANUP").is_ok_and(|v| v == "1");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            kiln_root,
            cache_root,
            make_jobs,
            clean_env,
            keep_build_dirs,
        })
    }

    /// Configuration rooted at an explicit directory, ignoring the environment.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            kiln_root: root.into(),
            cache_root: None,
            make_jobs: num_cpus::get(),
            clean_env: false,
            keep_build_dirs: false,
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.kiln_root.join("bin")
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.kiln_root.join("Cellar")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_root
            .clone()
            .unwrap_or_else(|| self.kiln_root.join("cache"))
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir().join("downloads")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.kiln_root.join("logs")
    }

    /// Subprocess logs of one install; versions of a package never share one.
    pub fn package_logs_dir(&self, name: &str, version: &str) -> PathBuf {
        self.logs_dir().join(name).join(version)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.kiln_root.join("tmp")
    }

    pub fn package_cellar_dir(&self, name: &str) -> PathBuf {
        self.cellar_dir().join(name)
    }

    /// The installation prefix of one package version.
    pub fn package_prefix(&self, name: &str, version: &str) -> PathBuf {
        self.package_cellar_dir(name).join(version)
    }

    pub fn home_dir(&self) -> PathBuf {
        UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
    }
}

fn parse_make_jobs(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(super::error::KilnError::Config(format!(
            "KILN_MAKE_JOBS must be a positive integer, got '{raw}'"
        ))),
        Ok(jobs) => Ok(jobs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_versioned_under_cellar() {
        let config = Config::with_root("/tmp/kiln-root");
        assert_eq!(
            config.package_prefix("ubertooth", "2014-02-R1"),
            PathBuf::from("/tmp/kiln-root/Cellar/ubertooth/2014-02-R1")
        );
        assert_eq!(
            config.downloads_dir(),
            PathBuf::from("/tmp/kiln-root/cache/downloads")
        );
        assert_eq!(
            config.package_logs_dir("ubertooth", "HEAD"),
            PathBuf::from("/tmp/kiln-root/logs/ubertooth/HEAD")
        );
    }

    #[test]
    fn cache_root_override_moves_downloads() {
        let mut config = Config::with_root("/tmp/kiln-root");
        config.cache_root = Some(PathBuf::from("/var/cache/kiln"));
        assert_eq!(
            config.downloads_dir(),
            PathBuf::from("/var/cache/kiln/downloads")
        );
    }

    #[test]
    fn make_jobs_must_be_positive() {
        assert_eq!(parse_make_jobs("8").ok(), Some(8));
        assert!(parse_make_jobs("0").is_err());
        assert!(parse_make_jobs("lots").is_err());
    }
}
