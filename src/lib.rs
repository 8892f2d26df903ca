// Public library interface for layerscan-rs
// The CLI and the debug tool are thin wrappers over these modules.

pub mod backend;
pub mod compression;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mediator;
pub mod path;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BackendError, ScanError};
pub use path::{PathSpec, TypeIndicator};
