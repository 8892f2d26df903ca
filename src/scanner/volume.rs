use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::context::{ScanContext, SourceType};
use super::identifiers::{normalize_volume_identifiers, volume_location};
use super::source::{is_device_path, SourceScanner};
use super::tree::NodeId;
use crate::backend::{BackendRegistry, VolumeSystem};
use crate::config::ScanConfig;
use crate::credentials::CredentialKind;
use crate::error::ScanError;
use crate::path::{PathSpec, TypeIndicator};

/// The operator declined to answer a mediator prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancelled by operator")
    }
}

impl std::error::Error for Cancelled {}

/// Decisions the volume scanner cannot make on its own.
///
/// Selection calls return `Ok(None)` to select nothing and `Err(Cancelled)`
/// to abort the whole scan. Returned identifiers may be bare numerals; the
/// scanner normalizes them.
pub trait ScanMediator {
    fn select_apfs_volumes(
        &mut self,
        volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled>;

    fn select_partitions(
        &mut self,
        volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled>;

    fn select_shadow_stores(
        &mut self,
        volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled>;

    /// Try to unlock `locked_node`, normally through
    /// [`SourceScanner::unlock`]. `Ok(true)` when it was unlocked.
    fn unlock_volume(
        &mut self,
        scanner: &SourceScanner,
        context: &ScanContext,
        locked_node: NodeId,
        credential_kinds: &[CredentialKind],
    ) -> Result<bool, Cancelled>;
}

/// Last word on whether a discovered file system becomes a base path
/// specification.
pub(crate) trait FileSystemFilter {
    fn accept(&mut self, registry: &BackendRegistry, path_spec: &PathSpec) -> Result<bool, ScanError>;
}

struct AcceptAll;

impl FileSystemFilter for AcceptAll {
    fn accept(&mut self, _registry: &BackendRegistry, _path_spec: &PathSpec) -> Result<bool, ScanError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeSelection {
    ApfsVolumes,
    Partitions,
    ShadowStores,
}

impl VolumeSelection {
    fn for_type(type_indicator: TypeIndicator) -> Option<Self> {
        match type_indicator {
            TypeIndicator::ApfsContainer => Some(VolumeSelection::ApfsVolumes),
            TypeIndicator::PartitionTable => Some(VolumeSelection::Partitions),
            TypeIndicator::ShadowStore => Some(VolumeSelection::ShadowStores),
            _ => None,
        }
    }

    fn missing_mediator(self) -> ScanError {
        ScanError::MissingMediator(match self {
            VolumeSelection::ApfsVolumes => {
                "APFS volumes found but no mediator to determine how they should be used."
            }
            VolumeSelection::Partitions => {
                "Partitions found but no mediator to determine how they should be used."
            }
            VolumeSelection::ShadowStores => {
                "VSS stores found but no mediator to determine how they should be used."
            }
        })
    }
}

/// Turns a source into the list of path specifications worth processing:
/// one per selected file system, the source itself when it holds none.
pub struct VolumeScanner {
    source_scanner: SourceScanner,
    mediator: Option<Box<dyn ScanMediator>>,
    config: ScanConfig,
    source_path: Option<PathBuf>,
    source_type: Option<SourceType>,
    context: Option<ScanContext>,
}

impl VolumeScanner {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            source_scanner: SourceScanner::new(registry),
            mediator: None,
            config: ScanConfig::default(),
            source_path: None,
            source_type: None,
            context: None,
        }
    }

    pub fn with_mediator(mut self, mediator: Box<dyn ScanMediator>) -> Self {
        self.mediator = Some(mediator);
        self
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        self.source_scanner.registry()
    }

    pub fn source_scanner(&self) -> &SourceScanner {
        &self.source_scanner
    }

    /// Source of the most recent scan.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Classification of the most recent source.
    pub fn source_type(&self) -> Option<SourceType> {
        self.source_type
    }

    /// Discovery tree of the most recent scan, kept even when it failed.
    pub fn scan_context(&self) -> Option<&ScanContext> {
        self.context.as_ref()
    }

    pub fn get_base_path_specs(
        &mut self,
        source_path: impl AsRef<Path>,
    ) -> Result<Vec<PathSpec>, ScanError> {
        self.scan_base_path_specs(source_path.as_ref(), &mut AcceptAll)
    }

    pub(crate) fn scan_base_path_specs(
        &mut self,
        source_path: &Path,
        filter: &mut dyn FileSystemFilter,
    ) -> Result<Vec<PathSpec>, ScanError> {
        if source_path.as_os_str().is_empty() {
            return Err(ScanError::InvalidSourcePath);
        }
        if !is_device_path(source_path) && !source_path.exists() {
            return Err(ScanError::SourceNotFound(source_path.to_path_buf()));
        }

        self.source_path = Some(source_path.to_path_buf());
        self.source_type = None;
        self.context = None;

        let mut context = self.source_scanner.open_source_path(source_path)?;
        let result = self.resolve(&mut context, filter);
        self.source_type = Some(context.source_type());
        self.context = Some(context);
        result
    }

    fn resolve(
        &mut self,
        context: &mut ScanContext,
        filter: &mut dyn FileSystemFilter,
    ) -> Result<Vec<PathSpec>, ScanError> {
        self.source_scanner.scan(context, None)?;
        tracing::info!(
            "Scanned {} as {}",
            context.source_path().display(),
            context.source_type()
        );

        if !context.source_type().is_storage_media() {
            return Ok(vec![context.root_scan_node().path_spec.clone()]);
        }

        // Skip the single-child chain of wrapper layers. Volume system roots
        // stop the descent so their selection rules always apply.
        let mut node = context.root_id();
        while !context.node(node).is_volume_system_root() {
            let mut children = context.tree().children(node);
            match (children.next(), children.next()) {
                (Some(only), None) => node = only,
                _ => break,
            }
        }

        let mut base_path_specs = Vec::new();
        self.scan_volume(context, node, filter, &mut base_path_specs)?;

        tracing::info!("Found {} base path specifications", base_path_specs.len());
        Ok(base_path_specs)
    }

    fn scan_volume(
        &mut self,
        context: &mut ScanContext,
        node: NodeId,
        filter: &mut dyn FileSystemFilter,
        base_path_specs: &mut Vec<PathSpec>,
    ) -> Result<(), ScanError> {
        let path_spec = context.node(node).path_spec.clone();

        if context.is_locked_scan_node(&path_spec) {
            self.scan_encrypted_volume(context, node)?;
            if context.is_locked_scan_node(&path_spec) {
                tracing::warn!("{} volume is still locked, skipping", path_spec.type_indicator());
                return Ok(());
            }
        }

        let scan_node = context.node(node);
        if scan_node.is_volume_system_root() {
            self.scan_volume_system_root(context, node, filter, base_path_specs)
        } else if scan_node.is_file_system() {
            if filter.accept(self.source_scanner.registry(), &path_spec)? {
                base_path_specs.push(path_spec);
            } else {
                tracing::debug!("Discarded {} file system", path_spec.type_indicator());
            }
            Ok(())
        } else if path_spec.type_indicator() == TypeIndicator::ShadowSnapshot
            && !scan_node.has_children()
        {
            let snapshot_file_system = PathSpec::builder(self.config.snapshot_file_system)
                .location("/")
                .parent(path_spec)
                .build()?;
            base_path_specs.push(snapshot_file_system);
            Ok(())
        } else {
            let children: Vec<NodeId> = context.tree().children(node).collect();
            for child in children {
                self.scan_volume(context, child, filter, base_path_specs)?;
            }
            Ok(())
        }
    }

    fn scan_encrypted_volume(
        &mut self,
        context: &mut ScanContext,
        node: NodeId,
    ) -> Result<(), ScanError> {
        let path_spec = context.node(node).path_spec.clone();
        let credential_kinds = self
            .source_scanner
            .registry()
            .credentials()
            .credential_kinds(&path_spec);
        if credential_kinds.is_empty() {
            return Err(ScanError::MissingCredentials(path_spec.type_indicator()));
        }

        let Some(mediator) = self.mediator.as_deref_mut() else {
            return Err(ScanError::MissingMediator(
                "Encrypted volume found but no mediator to determine how it should be unlocked.",
            ));
        };

        let unlocked = mediator
            .unlock_volume(&self.source_scanner, context, node, &credential_kinds)
            .map_err(|_| ScanError::UserAbort)?;
        if unlocked {
            self.source_scanner.scan(context, Some(&path_spec))?;
        }
        Ok(())
    }

    fn scan_volume_system_root(
        &mut self,
        context: &mut ScanContext,
        node: NodeId,
        filter: &mut dyn FileSystemFilter,
        base_path_specs: &mut Vec<PathSpec>,
    ) -> Result<(), ScanError> {
        let path_spec = context.node(node).path_spec.clone();
        let type_indicator = path_spec.type_indicator();
        let selection = VolumeSelection::for_type(type_indicator)
            .ok_or(ScanError::UnsupportedVolumeSystem(type_indicator))?;

        let mut identifiers = self.selected_identifiers(&path_spec, selection)?;
        if selection == VolumeSelection::ShadowStores {
            // Newest snapshot first.
            identifiers.reverse();
        }

        for identifier in identifiers {
            let sub_node = context
                .sub_node_by_location(node, &volume_location(&identifier))
                .ok_or_else(|| ScanError::MissingSubNode(identifier.clone()))?;
            self.scan_volume(context, sub_node, filter, base_path_specs)?;
        }
        Ok(())
    }

    fn selected_identifiers(
        &mut self,
        path_spec: &PathSpec,
        selection: VolumeSelection,
    ) -> Result<Vec<String>, ScanError> {
        let volume_system = self.source_scanner.registry().open_volume_system(path_spec)?;
        let identifiers = self.source_scanner.volume_identifiers(volume_system.as_ref());
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let selected = if selection == VolumeSelection::Partitions && identifiers.len() == 1 {
            identifiers
        } else {
            let Some(mediator) = self.mediator.as_deref_mut() else {
                return Err(selection.missing_mediator());
            };
            let answer = match selection {
                VolumeSelection::ApfsVolumes => {
                    mediator.select_apfs_volumes(volume_system.as_ref(), &identifiers)
                }
                VolumeSelection::Partitions => {
                    mediator.select_partitions(volume_system.as_ref(), &identifiers)
                }
                VolumeSelection::ShadowStores => {
                    mediator.select_shadow_stores(volume_system.as_ref(), &identifiers)
                }
            };
            match answer {
                Ok(selected) => selected.unwrap_or_default(),
                Err(Cancelled) => return Err(ScanError::UserAbort),
            }
        };

        let prefix = path_spec
            .type_indicator()
            .identifier_prefix()
            .unwrap_or_default();
        normalize_volume_identifiers(volume_system.as_ref(), &selected, prefix)
    }
}
