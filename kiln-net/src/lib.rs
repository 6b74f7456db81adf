// kiln-net/src/lib.rs
//! Retrieval of package and resource sources.
pub mod git;
pub mod http;
pub mod validation;

pub use git::checkout_head;
pub use http::fetch_archive;
pub use validation::{sha256_file, validate_url, verify_checksum};
