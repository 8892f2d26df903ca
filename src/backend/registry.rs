use std::collections::HashMap;
use std::fmt;

use super::ntfs::{NtfsAnalyzer, NtfsFileSystemOpener};
use super::os::OsFileSystemOpener;
use super::{FileSystem, FileSystemOpener, FormatAnalyzer, VolumeSystem, VolumeSystemOpener, VolumeUnlocker};
use crate::credentials::{CredentialsManager, CredentialsProvider};
use crate::error::BackendError;
use crate::path::{Category, PathSpec, TypeIndicator};

/// Format backends available to one scanner.
///
/// Built once at startup and handed to the scanners; nothing is looked up
/// through process-wide state.
pub struct BackendRegistry {
    analyzers: Vec<Box<dyn FormatAnalyzer>>,
    volume_systems: HashMap<TypeIndicator, Box<dyn VolumeSystemOpener>>,
    unlockers: HashMap<TypeIndicator, Box<dyn VolumeUnlocker>>,
    file_systems: HashMap<TypeIndicator, Box<dyn FileSystemOpener>>,
    credentials: Box<dyn CredentialsProvider>,
}

impl BackendRegistry {
    /// Registry with no backends and the default credential kinds.
    pub fn empty() -> Self {
        Self {
            analyzers: Vec::new(),
            volume_systems: HashMap::new(),
            unlockers: HashMap::new(),
            file_systems: HashMap::new(),
            credentials: Box::new(CredentialsManager::default()),
        }
    }

    /// Registry with the backends shipped in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_analyzer(Box::new(NtfsAnalyzer));
        registry.register_file_system(TypeIndicator::Ntfs, Box::new(NtfsFileSystemOpener));
        registry.register_file_system(TypeIndicator::Os, Box::new(OsFileSystemOpener));
        registry
    }

    pub fn register_analyzer(&mut self, analyzer: Box<dyn FormatAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn register_volume_system(
        &mut self,
        type_indicator: TypeIndicator,
        opener: Box<dyn VolumeSystemOpener>,
    ) {
        self.volume_systems.insert(type_indicator, opener);
    }

    pub fn register_unlocker(&mut self, type_indicator: TypeIndicator, unlocker: Box<dyn VolumeUnlocker>) {
        self.unlockers.insert(type_indicator, unlocker);
    }

    pub fn register_file_system(
        &mut self,
        type_indicator: TypeIndicator,
        opener: Box<dyn FileSystemOpener>,
    ) {
        self.file_systems.insert(type_indicator, opener);
    }

    pub fn set_credentials_provider(&mut self, provider: Box<dyn CredentialsProvider>) {
        self.credentials = provider;
    }

    pub fn credentials(&self) -> &dyn CredentialsProvider {
        self.credentials.as_ref()
    }

    /// Types in `category` whose analyzers match `path_spec`, in
    /// registration order.
    pub fn analyze(
        &self,
        category: Category,
        path_spec: &PathSpec,
    ) -> Result<Vec<TypeIndicator>, BackendError> {
        let mut matches = Vec::new();
        for analyzer in self
            .analyzers
            .iter()
            .filter(|a| a.type_indicator().category() == category)
        {
            if analyzer.analyze(path_spec)? {
                let type_indicator = analyzer.type_indicator();
                if !matches.contains(&type_indicator) {
                    matches.push(type_indicator);
                }
            }
        }
        Ok(matches)
    }

    pub fn open_volume_system(&self, path_spec: &PathSpec) -> Result<Box<dyn VolumeSystem>, BackendError> {
        let type_indicator = path_spec.type_indicator();
        match self.volume_systems.get(&type_indicator) {
            Some(opener) => opener.open(path_spec),
            None => Err(BackendError::new(format!(
                "No volume system backend registered for {}",
                type_indicator
            ))),
        }
    }

    /// Unlocker for lockable layer types, `None` for everything else.
    pub fn unlocker(&self, type_indicator: TypeIndicator) -> Option<&dyn VolumeUnlocker> {
        self.unlockers.get(&type_indicator).map(|u| u.as_ref())
    }

    /// Open the file system a path specification points at. `None` when no
    /// backend is registered for its type.
    pub fn open_file_system(
        &self,
        path_spec: &PathSpec,
    ) -> Result<Option<Box<dyn FileSystem>>, BackendError> {
        match self.file_systems.get(&path_spec.type_indicator()) {
            Some(opener) => opener.open(path_spec).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analyzers: Vec<TypeIndicator> = self.analyzers.iter().map(|a| a.type_indicator()).collect();
        let mut volume_systems: Vec<&TypeIndicator> = self.volume_systems.keys().collect();
        volume_systems.sort();
        let mut unlockers: Vec<&TypeIndicator> = self.unlockers.keys().collect();
        unlockers.sort();
        let mut file_systems: Vec<&TypeIndicator> = self.file_systems.keys().collect();
        file_systems.sort();

        f.debug_struct("BackendRegistry")
            .field("analyzers", &analyzers)
            .field("volume_systems", &volume_systems)
            .field("unlockers", &unlockers)
            .field("file_systems", &file_systems)
            .finish()
    }
}
