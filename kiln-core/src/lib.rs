// kiln-core/src/lib.rs

pub mod build;
pub mod env;
pub mod extract;
pub mod install;
pub mod installed;
pub mod process;
pub mod receipt;
pub mod stage;
pub mod template;

// Re-export key types for the CLI crate
pub use env::BuildEnvironment;
pub use install::{install, install_with, InstallOptions, InstallPlan};
pub use installed::{get_installed_packages, InstalledPackageInfo};
pub use receipt::InstallReceipt;
