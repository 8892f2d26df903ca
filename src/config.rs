use crate::path::TypeIndicator;

/// Directories whose presence marks a Windows system volume, in probe order.
pub const WINDOWS_DIRECTORIES: [&str; 4] = ["C:\\Windows", "C:\\WINNT", "C:\\WTSRV", "C:\\WINNT35"];

/// Configuration shared by the volume scanners.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File system type assumed beneath a shadow snapshot
    pub snapshot_file_system: TypeIndicator,
    /// Known system directories probed by the Windows scanner
    pub windows_directories: Vec<String>,
    /// Drive letter the Windows path resolver maps onto the volume root
    pub drive_letter: char,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            snapshot_file_system: TypeIndicator::Tsk,
            windows_directories: WINDOWS_DIRECTORIES.iter().map(|d| d.to_string()).collect(),
            drive_letter: 'C',
        }
    }
}
