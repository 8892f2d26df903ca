//! In-memory backends for exercising the scanners without disk images.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::rc::Rc;

use crate::backend::{
    BackendRegistry, FileSystem, FileSystemOpener, FormatAnalyzer, ReadSeek, Volume, VolumeSystem,
    VolumeSystemOpener, VolumeUnlocker,
};
use crate::credentials::{CredentialKind, Credentials};
use crate::error::BackendError;
use crate::path::{Category, PathSpec, TypeIndicator};
use crate::scanner::{Cancelled, NodeId, ScanContext, ScanMediator, SourceScanner};

pub(crate) struct FakeVolumeSystem {
    type_indicator: TypeIndicator,
    volumes: Vec<Volume>,
}

impl FakeVolumeSystem {
    pub fn new(type_indicator: TypeIndicator, identifiers: &[&str]) -> Self {
        Self {
            type_indicator,
            volumes: identifiers.iter().map(|id| Volume::new(id)).collect(),
        }
    }
}

impl VolumeSystem for FakeVolumeSystem {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator
    }

    fn volume_identifiers(&self) -> Vec<String> {
        self.volumes.iter().map(|v| v.identifier.to_string()).collect()
    }

    fn volume_by_identifier(&self, identifier: &str) -> Option<Volume> {
        self.volumes.iter().find(|v| v.identifier == identifier).cloned()
    }
}

#[derive(Default)]
struct MediaState {
    formats: HashMap<PathSpec, Vec<TypeIndicator>>,
    volumes: HashMap<PathSpec, Vec<&'static str>>,
    passwords: HashMap<PathSpec, String>,
    unlocked: HashSet<PathSpec>,
    entries: HashMap<PathSpec, BTreeMap<String, Option<Vec<u8>>>>,
    corrupt: HashSet<PathSpec>,
    volume_system_opens: usize,
}

/// A scripted source layout shared by every fake backend it registers.
#[derive(Clone, Default)]
pub(crate) struct FakeMedia(Rc<RefCell<MediaState>>);

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `type_indicator` when the layer at `at` is probed.
    pub fn add_format(&self, at: &PathSpec, type_indicator: TypeIndicator) {
        self.0
            .borrow_mut()
            .formats
            .entry(at.clone())
            .or_default()
            .push(type_indicator);
    }

    pub fn add_volumes(&self, volume_system: &PathSpec, identifiers: &[&'static str]) {
        self.0
            .borrow_mut()
            .volumes
            .insert(volume_system.clone(), identifiers.to_vec());
    }

    /// Lock the layer at `at` behind `password`.
    pub fn lock(&self, at: &PathSpec, password: &str) {
        self.0
            .borrow_mut()
            .passwords
            .insert(at.clone(), password.to_string());
    }

    /// Make every probe of the layer at `at` fail.
    pub fn corrupt(&self, at: &PathSpec) {
        self.0.borrow_mut().corrupt.insert(at.clone());
    }

    pub fn add_directory(&self, file_system: &PathSpec, location: &str) {
        self.0
            .borrow_mut()
            .entries
            .entry(file_system.clone())
            .or_default()
            .insert(location.to_string(), None);
    }

    pub fn add_file(&self, file_system: &PathSpec, location: &str, data: &[u8]) {
        self.0
            .borrow_mut()
            .entries
            .entry(file_system.clone())
            .or_default()
            .insert(location.to_string(), Some(data.to_vec()));
    }

    pub fn volume_system_opens(&self) -> usize {
        self.0.borrow().volume_system_opens
    }

    /// Registry with a fake analyzer for every probed type, volume systems,
    /// BDE and APFS volume unlockers and file systems.
    pub fn registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::empty();
        for type_indicator in TypeIndicator::ALL {
            match type_indicator.category() {
                Category::Source | Category::Volume => {}
                _ => registry.register_analyzer(Box::new(FakeAnalyzer {
                    type_indicator,
                    media: self.clone(),
                })),
            }
            if type_indicator.is_volume_system() {
                registry.register_volume_system(type_indicator, Box::new(self.clone()));
            }
            if type_indicator.is_file_system() {
                registry.register_file_system(type_indicator, Box::new(self.clone()));
            }
        }
        for type_indicator in [TypeIndicator::Bde, TypeIndicator::ApfsVolume] {
            registry.register_unlocker(type_indicator, Box::new(self.clone()));
        }
        registry
    }
}

struct FakeAnalyzer {
    type_indicator: TypeIndicator,
    media: FakeMedia,
}

impl FormatAnalyzer for FakeAnalyzer {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator
    }

    fn analyze(&self, path_spec: &PathSpec) -> Result<bool, BackendError> {
        let state = self.media.0.borrow();
        if state.corrupt.contains(path_spec) {
            return Err(BackendError::new("corrupt header"));
        }
        Ok(state
            .formats
            .get(path_spec)
            .is_some_and(|found| found.contains(&self.type_indicator)))
    }
}

impl VolumeSystemOpener for FakeMedia {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn VolumeSystem>, BackendError> {
        let mut state = self.0.borrow_mut();
        state.volume_system_opens += 1;
        let identifiers = state.volumes.get(path_spec).cloned().unwrap_or_default();
        Ok(Box::new(FakeVolumeSystem::new(
            path_spec.type_indicator(),
            &identifiers,
        )))
    }
}

impl VolumeUnlocker for FakeMedia {
    fn is_locked(&self, path_spec: &PathSpec) -> Result<bool, BackendError> {
        let state = self.0.borrow();
        Ok(state.passwords.contains_key(path_spec) && !state.unlocked.contains(path_spec))
    }

    fn unlock(&self, path_spec: &PathSpec, credentials: Credentials) -> Result<bool, BackendError> {
        let mut state = self.0.borrow_mut();
        let accepted = match (
            state.passwords.get(path_spec),
            credentials.get(CredentialKind::Password),
        ) {
            (Some(expected), Some(given)) => expected.as_bytes() == given,
            _ => false,
        };
        if accepted {
            state.unlocked.insert(path_spec.clone());
        }
        Ok(accepted)
    }
}

impl FileSystemOpener for FakeMedia {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn FileSystem>, BackendError> {
        let entries = self
            .0
            .borrow()
            .entries
            .get(path_spec)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FakeFileSystem {
            type_indicator: path_spec.type_indicator(),
            entries,
        }))
    }
}

struct FakeFileSystem {
    type_indicator: TypeIndicator,
    entries: BTreeMap<String, Option<Vec<u8>>>,
}

fn parent_location(location: &str) -> &str {
    match location.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => "/",
    }
}

impl FileSystem for FakeFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator
    }

    fn list_directory(&mut self, location: &str) -> Result<Option<Vec<String>>, BackendError> {
        if location != "/" && !matches!(self.entries.get(location), Some(None)) {
            return Ok(None);
        }
        let names = self
            .entries
            .keys()
            .filter(|entry| parent_location(entry) == location)
            .filter_map(|entry| entry.rsplit('/').next())
            .map(str::to_string)
            .collect();
        Ok(Some(names))
    }

    fn open_file(&mut self, location: &str) -> Result<Option<Box<dyn ReadSeek>>, BackendError> {
        Ok(match self.entries.get(location) {
            Some(Some(data)) => Some(Box::new(Cursor::new(data.clone()))),
            _ => None,
        })
    }
}

/// One call a [`RecordingMediator`] received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MediatorCall {
    ApfsVolumes(Vec<String>),
    Partitions(Vec<String>),
    ShadowStores(Vec<String>),
    Unlock(TypeIndicator, Vec<CredentialKind>),
}

/// Mediator that records every call and answers from a script.
pub(crate) struct RecordingMediator {
    calls: Rc<RefCell<Vec<MediatorCall>>>,
    /// Answer to every selection call; `None` selects everything offered
    pub selection: Option<Vec<String>>,
    /// Password tried on locked volumes
    pub password: Option<String>,
    /// Report every unlock as successful without touching the backend
    pub claim_unlocked: bool,
    pub cancel: bool,
}

impl RecordingMediator {
    pub fn new() -> (Self, Rc<RefCell<Vec<MediatorCall>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mediator = Self {
            calls: Rc::clone(&calls),
            selection: None,
            password: None,
            claim_unlocked: false,
            cancel: false,
        };
        (mediator, calls)
    }

    fn select(&mut self, call: MediatorCall, offered: &[String]) -> Result<Option<Vec<String>>, Cancelled> {
        self.calls.borrow_mut().push(call);
        if self.cancel {
            return Err(Cancelled);
        }
        Ok(Some(
            self.selection.clone().unwrap_or_else(|| offered.to_vec()),
        ))
    }
}

impl ScanMediator for RecordingMediator {
    fn select_apfs_volumes(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.select(MediatorCall::ApfsVolumes(identifiers.to_vec()), identifiers)
    }

    fn select_partitions(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.select(MediatorCall::Partitions(identifiers.to_vec()), identifiers)
    }

    fn select_shadow_stores(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.select(MediatorCall::ShadowStores(identifiers.to_vec()), identifiers)
    }

    fn unlock_volume(
        &mut self,
        scanner: &SourceScanner,
        context: &ScanContext,
        locked_node: NodeId,
        credential_kinds: &[CredentialKind],
    ) -> Result<bool, Cancelled> {
        let path_spec = &context.node(locked_node).path_spec;
        self.calls.borrow_mut().push(MediatorCall::Unlock(
            path_spec.type_indicator(),
            credential_kinds.to_vec(),
        ));
        if self.cancel {
            return Err(Cancelled);
        }
        if self.claim_unlocked {
            return Ok(true);
        }
        let Some(password) = self.password.clone() else {
            return Ok(false);
        };
        let credentials =
            Credentials::new(path_spec.clone()).with(CredentialKind::Password, password.into_bytes());
        Ok(scanner.unlock(path_spec, credentials).unwrap_or(false))
    }
}

pub(crate) fn layer(
    type_indicator: TypeIndicator,
    location: Option<&str>,
    parent: &PathSpec,
) -> PathSpec {
    let mut builder = PathSpec::builder(type_indicator).parent(parent.clone());
    if let Some(location) = location {
        builder = builder.location(location);
    }
    builder.build().unwrap()
}

/// `<image>` file with a raw image layer on top of it.
pub(crate) fn raw_image(media: &FakeMedia, path: &std::path::Path) -> PathSpec {
    let os = PathSpec::os(path);
    media.add_format(&os, TypeIndicator::Raw);
    layer(TypeIndicator::Raw, None, &os)
}

/// Partition table under `container` with the given partitions.
pub(crate) fn partition_table(
    media: &FakeMedia,
    container: &PathSpec,
    identifiers: &[&'static str],
) -> PathSpec {
    media.add_format(container, TypeIndicator::PartitionTable);
    let table = layer(TypeIndicator::PartitionTable, Some("/"), container);
    media.add_volumes(&table, identifiers);
    table
}

pub(crate) fn file_system(
    media: &FakeMedia,
    type_indicator: TypeIndicator,
    container: &PathSpec,
) -> PathSpec {
    media.add_format(container, type_indicator);
    layer(type_indicator, Some("/"), container)
}
