use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::tree::{NodeId, ScanNode, ScanTree};
use crate::path::PathSpec;

/// What the raw source turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Regular file with no recognized container format
    File,
    Directory,
    /// Block or character device, or a `\\.\` device path
    StorageMediaDevice,
    /// File holding a storage media image, volume system or file system
    StorageMediaImage,
}

impl SourceType {
    /// Whether the source needs volume resolution.
    pub fn is_storage_media(self) -> bool {
        matches!(
            self,
            SourceType::StorageMediaDevice | SourceType::StorageMediaImage
        )
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::File => "file",
            SourceType::Directory => "directory",
            SourceType::StorageMediaDevice => "storage media device",
            SourceType::StorageMediaImage => "storage media image",
        };
        f.write_str(name)
    }
}

/// State of one scan of one source: the discovery tree, the source
/// classification and the layers currently locked.
#[derive(Debug, Clone)]
pub struct ScanContext {
    source_path: PathBuf,
    source_type: SourceType,
    tree: ScanTree,
    locked: HashSet<PathSpec>,
}

impl ScanContext {
    pub(crate) fn new(source_path: &Path, source_type: SourceType) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            source_type,
            tree: ScanTree::new(PathSpec::os(source_path)),
            locked: HashSet::new(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn tree(&self) -> &ScanTree {
        &self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root
    }

    pub fn root_scan_node(&self) -> &ScanNode {
        self.tree.get(self.tree.root)
    }

    pub fn node(&self, id: NodeId) -> &ScanNode {
        self.tree.get(id)
    }

    pub fn sub_node_by_location(&self, parent: NodeId, location: &str) -> Option<NodeId> {
        self.tree.sub_node_by_location(parent, location)
    }

    pub fn is_locked_scan_node(&self, path_spec: &PathSpec) -> bool {
        self.locked.contains(path_spec)
    }

    pub fn is_locked(&self, id: NodeId) -> bool {
        self.is_locked_scan_node(&self.tree.get(id).path_spec)
    }

    /// Path specifications of the locked nodes, in tree order.
    pub fn locked_scan_nodes(&self) -> Vec<&PathSpec> {
        self.tree
            .nodes
            .iter()
            .map(|node| &node.path_spec)
            .filter(|spec| self.locked.contains(*spec))
            .collect()
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ScanTree {
        &mut self.tree
    }

    pub(crate) fn set_source_type(&mut self, source_type: SourceType) {
        self.source_type = source_type;
    }

    pub(crate) fn set_locked(&mut self, path_spec: &PathSpec, locked: bool) {
        if locked {
            self.locked.insert(path_spec.clone());
        } else {
            self.locked.remove(path_spec);
        }
    }
}
