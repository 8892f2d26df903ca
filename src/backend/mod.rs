//! Collaborator interfaces the scanners drive, and the registry that holds
//! the implementations for one process.
//!
//! Nothing here parses on-disk formats itself. Format knowledge lives in the
//! implementations registered with a [`BackendRegistry`]: analyzers answer
//! "is this layer format X", volume systems enumerate sub-volumes, unlockers
//! report and change lock state, file systems list and read entries.

pub mod ntfs;
pub mod os;
pub mod registry;

use std::io::{Read, Seek};

use compact_str::CompactString;

use crate::credentials::Credentials;
use crate::error::BackendError;
use crate::path::{PathSpec, TypeIndicator};

pub use self::registry::BackendRegistry;

/// Signature probe for one format.
pub trait FormatAnalyzer {
    fn type_indicator(&self) -> TypeIndicator;

    /// Whether the data addressed by `path_spec` is in this format.
    /// Errors are reserved for probes that could not run (unreadable or
    /// corrupt data), not for a plain mismatch.
    fn analyze(&self, path_spec: &PathSpec) -> Result<bool, BackendError>;
}

/// One addressable sub-volume of a volume system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Identifier as reported by the volume system, e.g. `p1` or `vss2`
    pub identifier: CompactString,
    /// Byte offset of the volume inside its container, when it has one
    pub start_offset: Option<u64>,
    /// Volume size in bytes, when known
    pub size: Option<u64>,
}

impl Volume {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: CompactString::new(identifier),
            start_offset: None,
            size: None,
        }
    }
}

/// An opened volume system: partition table, APFS container or shadow store.
pub trait VolumeSystem {
    fn type_indicator(&self) -> TypeIndicator;

    /// Identifiers of the volumes, in the system's native order.
    fn volume_identifiers(&self) -> Vec<String>;

    fn volume_by_identifier(&self, identifier: &str) -> Option<Volume>;
}

/// Opens a volume system rooted at a path specification.
pub trait VolumeSystemOpener {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn VolumeSystem>, BackendError>;
}

/// Lock state of an encrypted layer.
///
/// The unlocker owns the unlocked state; the scanner only asks.
pub trait VolumeUnlocker {
    fn is_locked(&self, path_spec: &PathSpec) -> Result<bool, BackendError>;

    /// Try the credentials. `Ok(false)` means they were rejected.
    fn unlock(&self, path_spec: &PathSpec, credentials: Credentials) -> Result<bool, BackendError>;
}

/// Readable, seekable file content.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// An opened file system. Locations are `/`-separated and relative to the
/// file system root.
pub trait FileSystem {
    fn type_indicator(&self) -> TypeIndicator;

    /// Names of the entries in the directory at `location`, or `None` when
    /// there is no directory there.
    fn list_directory(&mut self, location: &str) -> Result<Option<Vec<String>>, BackendError>;

    /// Content of the file at `location`, or `None` when there is no file.
    fn open_file(&mut self, location: &str) -> Result<Option<Box<dyn ReadSeek>>, BackendError>;
}

pub trait FileSystemOpener {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn FileSystem>, BackendError>;
}

/// Join a parent location and an entry name.
pub(crate) fn join_location(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{}/{}", parent, name)
}

/// Non-empty segments of a location.
pub(crate) fn location_segments(location: &str) -> impl Iterator<Item = &str> {
    location.split('/').filter(|s| !s.is_empty())
}
