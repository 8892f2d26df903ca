use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::context::SourceType;
use super::volume::{FileSystemFilter, ScanMediator, VolumeScanner};
use crate::backend::{join_location, location_segments, BackendRegistry, FileSystem, ReadSeek};
use crate::config::ScanConfig;
use crate::error::{BackendError, ScanError};
use crate::path::{PathSpec, TypeIndicator};

/// Resolves Windows paths (`C:\Windows\System32`, `%SystemRoot%\...`)
/// against one mounted file system.
pub struct WindowsPathResolver {
    file_system: Box<dyn FileSystem>,
    mount_point: PathSpec,
    drive_letter: char,
    /// Keyed by lowercased name
    environment: HashMap<String, String>,
}

impl WindowsPathResolver {
    pub fn new(file_system: Box<dyn FileSystem>, mount_point: PathSpec, drive_letter: char) -> Self {
        Self {
            file_system,
            mount_point,
            drive_letter,
            environment: HashMap::new(),
        }
    }

    pub fn mount_point(&self) -> &PathSpec {
        &self.mount_point
    }

    /// Bind `%name%`, matched case-insensitively.
    pub fn set_environment_variable(&mut self, name: &str, value: &str) {
        let value = value.trim_end_matches('\\');
        self.environment
            .insert(name.to_lowercase(), value.to_string());
    }

    pub fn environment_variable(&self, name: &str) -> Option<&str> {
        self.environment.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn file_system_mut(&mut self) -> &mut dyn FileSystem {
        self.file_system.as_mut()
    }

    /// Location inside the file system of an existing entry, with the
    /// on-disk case of every segment. `None` when any segment is missing,
    /// a variable is unbound, or the path names another drive.
    pub fn resolve_location(&mut self, windows_path: &str) -> Result<Option<String>, BackendError> {
        let Some(segments) = self.path_segments(windows_path, true) else {
            return Ok(None);
        };

        let mut location = String::from("/");
        for segment in segments {
            let Some(entries) = self.file_system.list_directory(&location)? else {
                return Ok(None);
            };
            let found = entries
                .iter()
                .find(|entry| **entry == segment)
                .or_else(|| entries.iter().find(|entry| entry.eq_ignore_ascii_case(&segment)));
            match found {
                Some(entry) => location = join_location(&location, entry),
                None => return Ok(None),
            }
        }
        Ok(Some(location))
    }

    /// Path specification of an existing entry, stacked on the mount point.
    pub fn resolve_path(&mut self, windows_path: &str) -> Result<Option<PathSpec>, ScanError> {
        let Some(location) = self.resolve_location(windows_path)? else {
            return Ok(None);
        };

        if self.file_system.type_indicator() == TypeIndicator::Os {
            let mut host_path = PathBuf::from(self.mount_point.location().unwrap_or("/"));
            host_path.extend(location_segments(&location));
            return Ok(Some(PathSpec::os(host_path)));
        }

        let path_spec = PathSpec::builder(self.file_system.type_indicator())
            .location(&location)
            .parent(self.mount_point.clone())
            .build()?;
        Ok(Some(path_spec))
    }

    fn path_segments(&self, windows_path: &str, expand_variables: bool) -> Option<Vec<String>> {
        let path = windows_path.strip_prefix("\\\\?\\").unwrap_or(windows_path);
        let mut segments: Vec<String> = Vec::new();

        for (index, segment) in path.split('\\').enumerate() {
            if index == 0 && is_drive(segment) {
                if !segment.starts_with(|c: char| c.eq_ignore_ascii_case(&self.drive_letter)) {
                    return None;
                }
                continue;
            }
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                _ => {
                    let variable = segment
                        .strip_prefix('%')
                        .and_then(|s| s.strip_suffix('%'))
                        .filter(|name| !name.is_empty());
                    match variable {
                        Some(name) if expand_variables => {
                            let value = self.environment_variable(name)?;
                            segments.extend(self.path_segments(value, false)?);
                        }
                        _ => segments.push(segment.to_string()),
                    }
                }
            }
        }
        Some(segments)
    }
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Mount point a file system layer is read through: its parent, or itself
/// for a host directory.
fn mount_point(path_spec: &PathSpec) -> PathSpec {
    match path_spec.parent() {
        Some(parent) if path_spec.type_indicator() != TypeIndicator::Os => parent.clone(),
        _ => path_spec.clone(),
    }
}

/// First known Windows directory present, as the configured path.
fn probe_windows_directory(
    resolver: &mut WindowsPathResolver,
    directories: &[String],
) -> Result<Option<String>, BackendError> {
    for directory in directories {
        if resolver.resolve_location(directory)?.is_some() {
            return Ok(Some(directory.clone()));
        }
    }
    Ok(None)
}

struct WindowsDirectoryFilter<'a> {
    config: &'a ScanConfig,
    found: Option<String>,
}

impl FileSystemFilter for WindowsDirectoryFilter<'_> {
    fn accept(&mut self, registry: &BackendRegistry, path_spec: &PathSpec) -> Result<bool, ScanError> {
        let Some(file_system) = registry.open_file_system(path_spec)? else {
            tracing::debug!("No backend to read {} file system", path_spec.type_indicator());
            return Ok(false);
        };
        let mut resolver =
            WindowsPathResolver::new(file_system, mount_point(path_spec), self.config.drive_letter);
        match probe_windows_directory(&mut resolver, &self.config.windows_directories)? {
            Some(directory) => {
                tracing::info!("Found Windows directory {}", directory);
                if self.found.is_none() {
                    self.found = Some(directory);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Volume scanner that only keeps file systems holding a Windows
/// installation, and reads files from the first one by Windows path.
pub struct WindowsVolumeScanner {
    scanner: VolumeScanner,
    windows_directory: Option<String>,
    path_resolver: Option<WindowsPathResolver>,
}

impl WindowsVolumeScanner {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            scanner: VolumeScanner::new(registry),
            windows_directory: None,
            path_resolver: None,
        }
    }

    pub fn with_mediator(mut self, mediator: Box<dyn ScanMediator>) -> Self {
        self.scanner = self.scanner.with_mediator(mediator);
        self
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.scanner = self.scanner.with_config(config);
        self
    }

    pub fn volume_scanner(&self) -> &VolumeScanner {
        &self.scanner
    }

    /// Windows directory found by the last scan, e.g. `C:\WINNT`.
    pub fn windows_directory(&self) -> Option<&str> {
        self.windows_directory.as_deref()
    }

    pub fn path_resolver(&self) -> Option<&WindowsPathResolver> {
        self.path_resolver.as_ref()
    }

    /// Base path specifications restricted to Windows system volumes.
    pub fn get_base_path_specs(
        &mut self,
        source_path: impl AsRef<Path>,
    ) -> Result<Vec<PathSpec>, ScanError> {
        self.windows_directory = None;
        self.path_resolver = None;

        let config = self.scanner.config().clone();
        let mut filter = WindowsDirectoryFilter {
            config: &config,
            found: None,
        };
        let base_path_specs = self
            .scanner
            .scan_base_path_specs(source_path.as_ref(), &mut filter)?;
        self.windows_directory = filter.found;
        Ok(base_path_specs)
    }

    /// Scan for a Windows system volume and bind `%SystemRoot%` and
    /// `%WinDir%` to its Windows directory. `false` when there is none.
    pub fn scan_for_windows_volume(&mut self, source_path: impl AsRef<Path>) -> Result<bool, ScanError> {
        let base_path_specs = self.get_base_path_specs(source_path)?;
        let Some(path_spec) = base_path_specs.first() else {
            return Ok(false);
        };
        if self.scanner.source_type() == Some(SourceType::File) {
            return Ok(false);
        }

        let Some(file_system) = self.scanner.registry().open_file_system(path_spec)? else {
            return Ok(false);
        };
        let config = self.scanner.config();
        let mut resolver =
            WindowsPathResolver::new(file_system, mount_point(path_spec), config.drive_letter);

        if self.windows_directory.is_none() {
            self.windows_directory = probe_windows_directory(&mut resolver, &config.windows_directories)?;
        }
        let Some(windows_directory) = self.windows_directory.clone() else {
            return Ok(false);
        };

        resolver.set_environment_variable("SystemRoot", &windows_directory);
        resolver.set_environment_variable("WinDir", &windows_directory);
        self.path_resolver = Some(resolver);
        Ok(true)
    }

    /// Open a file on the Windows volume by Windows path. `None` before a
    /// successful [`scan_for_windows_volume`](Self::scan_for_windows_volume)
    /// or when the file does not exist.
    pub fn open_file(&mut self, windows_path: &str) -> Result<Option<Box<dyn ReadSeek>>, ScanError> {
        let Some(resolver) = self.path_resolver.as_mut() else {
            tracing::warn!("No Windows volume selected, cannot open {}", windows_path);
            return Ok(None);
        };
        let Some(location) = resolver.resolve_location(windows_path)? else {
            return Ok(None);
        };
        Ok(resolver.file_system_mut().open_file(&location)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::backend::os::OsFileSystemOpener;
    use crate::backend::FileSystemOpener;
    use crate::testing::{file_system, layer, partition_table, raw_image, FakeMedia, RecordingMediator};

    fn windows_scanner(media: &FakeMedia) -> WindowsVolumeScanner {
        WindowsVolumeScanner::new(Arc::new(media.registry()))
    }

    #[test]
    fn winnt_volume_is_accepted_with_its_system_root() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let media = FakeMedia::new();
        let raw = raw_image(&media, file.path());
        let ntfs = file_system(&media, TypeIndicator::Ntfs, &raw);
        media.add_directory(&ntfs, "/WINNT");
        media.add_directory(&ntfs, "/WINNT/system32");
        media.add_file(&ntfs, "/WINNT/system32/config.sys", b"DEVICE=HIMEM.SYS");

        let mut scanner = windows_scanner(&media);
        assert!(scanner.scan_for_windows_volume(file.path()).unwrap());
        assert_eq!(scanner.windows_directory(), Some("C:\\WINNT"));
        let resolver = scanner.path_resolver().unwrap();
        assert_eq!(resolver.environment_variable("SYSTEMROOT"), Some("C:\\WINNT"));
        assert_eq!(resolver.environment_variable("windir"), Some("C:\\WINNT"));

        let mut file = scanner
            .open_file("%SystemRoot%\\System32\\CONFIG.SYS")
            .unwrap()
            .unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "DEVICE=HIMEM.SYS");
    }

    #[test]
    fn volumes_without_windows_directory_are_excluded() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let media = FakeMedia::new();
        let raw = raw_image(&media, file.path());
        let table = partition_table(&media, &raw, &["p1", "p2"]);
        let p1 = layer(TypeIndicator::Partition, Some("/p1"), &table);
        let data = file_system(&media, TypeIndicator::Fat, &p1);
        media.add_directory(&data, "/Users");
        let p2 = layer(TypeIndicator::Partition, Some("/p2"), &table);
        let system = file_system(&media, TypeIndicator::Ntfs, &p2);
        media.add_directory(&system, "/Windows");

        let (mediator, _) = RecordingMediator::new();
        let mut scanner = windows_scanner(&media).with_mediator(Box::new(mediator));
        let specs = scanner.get_base_path_specs(file.path()).unwrap();
        assert_eq!(specs, vec![system]);
        assert_eq!(scanner.windows_directory(), Some("C:\\Windows"));
    }

    #[test]
    fn no_windows_volume_found() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let media = FakeMedia::new();
        let raw = raw_image(&media, file.path());
        let ext = file_system(&media, TypeIndicator::Ext, &raw);
        media.add_directory(&ext, "/etc");

        let mut scanner = windows_scanner(&media);
        assert!(!scanner.scan_for_windows_volume(file.path()).unwrap());
        assert!(scanner.open_file("C:\\etc").unwrap().is_none());
    }

    #[test]
    fn resolver_handles_dots_prefixes_and_drives() {
        let media = FakeMedia::new();
        let fs_spec = layer(TypeIndicator::Ntfs, Some("/"), &PathSpec::os("/images/c.raw"));
        media.add_directory(&fs_spec, "/Windows");
        media.add_directory(&fs_spec, "/Windows/System32");
        let file_system = media.registry().open_file_system(&fs_spec).unwrap().unwrap();
        let mut resolver = WindowsPathResolver::new(file_system, mount_point(&fs_spec), 'C');

        assert_eq!(
            resolver.resolve_location("\\\\?\\c:\\windows\\.\\Temp\\..\\system32").unwrap(),
            Some("/Windows/System32".to_string())
        );
        assert_eq!(resolver.resolve_location("D:\\Windows").unwrap(), None);
        assert_eq!(resolver.resolve_location("%WinDir%\\System32").unwrap(), None);

        resolver.set_environment_variable("WinDir", "C:\\Windows\\");
        let resolved = resolver.resolve_path("%windir%\\System32").unwrap().unwrap();
        assert_eq!(resolved.type_indicator(), TypeIndicator::Ntfs);
        assert_eq!(resolved.location(), Some("/Windows/System32"));
        assert_eq!(resolved.parent(), fs_spec.parent());
    }

    #[test]
    fn resolver_on_host_directory_yields_os_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Windows").join("System32")).unwrap();
        let mount = PathSpec::os(dir.path());
        let file_system = OsFileSystemOpener.open(&mount).unwrap();
        let mut resolver = WindowsPathResolver::new(file_system, mount, 'C');

        let resolved = resolver.resolve_path("C:\\WINDOWS\\system32").unwrap().unwrap();
        assert_eq!(
            resolved,
            PathSpec::os(dir.path().join("Windows").join("System32"))
        );
    }
}
