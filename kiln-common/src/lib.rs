// kiln-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;
pub mod recipe;

// Re-export key types
pub use config::Config;
pub use error::{BuildPhase, KilnError, Result};
pub use recipe::Recipe;
