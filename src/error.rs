use std::path::PathBuf;

use crate::path::{PathSpecError, TypeIndicator};

/// Failure reported by a backend collaborator (format analyzer, volume
/// system, file system, decompressor).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::with_source(format!("I/O error: {}", err), err)
    }
}

/// Errors that abort a scan. No partial result is returned with any of them.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid source path.")]
    InvalidSourcePath,

    #[error("No such device, file or directory: {}.", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unable to scan source with error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid path specification: {0}")]
    PathSpec(#[from] PathSpecError),

    #[error("Invalid or missing scan node.")]
    InvalidScanNode,

    #[error("Unable to proceed. {0}")]
    MissingMediator(&'static str),

    #[error("Volume missing for identifier: {0}.")]
    VolumeMissing(String),

    #[error("Scan node missing for volume identifier: {0}.")]
    MissingSubNode(String),

    #[error("Unsupported volume system type: {0}.")]
    UnsupportedVolumeSystem(TypeIndicator),

    #[error("Missing credentials for scan node: {0}.")]
    MissingCredentials(TypeIndicator),

    #[error("Unsupported credential {kind} for {type_indicator}.")]
    UnsupportedCredential {
        kind: &'static str,
        type_indicator: TypeIndicator,
    },

    #[error("Credentials were issued for a different path specification.")]
    CredentialsMismatch,

    #[error("File system scan aborted.")]
    UserAbort,
}

impl ScanError {
    /// Whether the operator cancelled the scan, as opposed to a source or
    /// configuration problem.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, ScanError::UserAbort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_wrap_into_scan_errors() {
        let err: ScanError = BackendError::new("corrupt header").into();
        assert_eq!(
            err.to_string(),
            "Unable to scan source with error: corrupt header"
        );
        assert!(!err.is_user_abort());
        assert!(ScanError::UserAbort.is_user_abort());
    }

    #[test]
    fn missing_source_names_the_path() {
        let err = ScanError::SourceNotFound(PathBuf::from("/no/such/path"));
        assert!(err.to_string().contains("/no/such/path"));
    }
}
