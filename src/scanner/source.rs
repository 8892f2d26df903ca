use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use super::context::{ScanContext, SourceType};
use super::identifiers::{find_volume, normalize_identifier, volume_location};
use super::tree::NodeId;
use crate::backend::{BackendRegistry, VolumeSystem};
use crate::credentials::Credentials;
use crate::error::{BackendError, ScanError};
use crate::path::{Category, PathSpec, TypeIndicator};

/// Prefix of Windows device paths such as `\\.\PhysicalDrive0`.
const DEVICE_PATH_PREFIX: &str = "\\\\.\\";

pub(crate) fn is_device_path(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|p| p.starts_with(DEVICE_PATH_PREFIX))
}

/// Builds the discovery tree for a source by probing each layer with the
/// registered format analyzers.
pub struct SourceScanner {
    registry: Arc<BackendRegistry>,
}

impl SourceScanner {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Classify the source and start a context holding only its root node.
    pub fn open_source_path(&self, source_path: &Path) -> Result<ScanContext, ScanError> {
        let source_type = classify_source(source_path)?;
        tracing::debug!("Opened {} as {}", source_path.display(), source_type);
        Ok(ScanContext::new(source_path, source_type))
    }

    /// Probe the tree beneath `scan_path_spec`, or beneath the root when
    /// none is given. Existing nodes are reused, so a re-scan after an
    /// unlock only adds what became visible.
    pub fn scan(
        &self,
        context: &mut ScanContext,
        scan_path_spec: Option<&PathSpec>,
    ) -> Result<(), ScanError> {
        let start = match scan_path_spec {
            Some(path_spec) => context
                .tree()
                .find(path_spec)
                .ok_or(ScanError::InvalidScanNode)?,
            None => context.root_id(),
        };
        self.scan_node(context, start)?;

        if context.source_type() == SourceType::File && has_storage_layers(context) {
            context.set_source_type(SourceType::StorageMediaImage);
        }
        tracing::debug!(
            "Scan of {} finished with {} nodes",
            context.source_path().display(),
            context.tree().len()
        );
        Ok(())
    }

    /// Identifiers of the volumes in native order.
    pub fn volume_identifiers(&self, volume_system: &dyn VolumeSystem) -> Vec<String> {
        volume_system.volume_identifiers()
    }

    /// Hand `credentials` to the backend that owns `path_spec`'s lock.
    /// The lock state in the context is refreshed by the next scan.
    pub fn unlock(&self, path_spec: &PathSpec, credentials: Credentials) -> Result<bool, ScanError> {
        let type_indicator = path_spec.type_indicator();
        if credentials.path_spec() != path_spec {
            return Err(ScanError::CredentialsMismatch);
        }

        let supported = self.registry.credentials().credential_kinds(path_spec);
        if supported.is_empty() {
            return Err(ScanError::MissingCredentials(type_indicator));
        }
        if let Some(kind) = credentials.kinds().find(|kind| !supported.contains(kind)) {
            return Err(ScanError::UnsupportedCredential {
                kind: kind.as_str(),
                type_indicator,
            });
        }

        let unlocker = self.registry.unlocker(type_indicator).ok_or_else(|| {
            BackendError::new(format!("No unlock backend registered for {}", type_indicator))
        })?;
        let unlocked = unlocker.unlock(path_spec, credentials)?;
        if unlocked {
            tracing::info!("Unlocked {} volume", type_indicator);
        } else {
            tracing::info!("Credentials rejected for {} volume", type_indicator);
        }
        Ok(unlocked)
    }

    fn scan_node(&self, context: &mut ScanContext, id: NodeId) -> Result<(), ScanError> {
        let path_spec = context.node(id).path_spec.clone();
        let type_indicator = path_spec.type_indicator();

        if let Some(unlocker) = self.registry.unlocker(type_indicator) {
            let locked = unlocker.is_locked(&path_spec)?;
            context.set_locked(&path_spec, locked);
            if locked {
                tracing::info!("Found locked {} volume", type_indicator);
                return Ok(());
            }
        }

        match type_indicator.category() {
            Category::VolumeSystem => return self.scan_volume_system_root(context, id, &path_spec),
            Category::FileSystem => return Ok(()),
            _ if type_indicator == TypeIndicator::ShadowSnapshot => return Ok(()),
            _ => {}
        }

        if type_indicator == TypeIndicator::Os {
            if context.source_type() == SourceType::Directory {
                return Ok(());
            }
            for category in [Category::StorageMediaImage, Category::CompressedStream] {
                if let Some(found) = self.single_match(category, &path_spec)? {
                    let child = PathSpec::builder(found).parent(path_spec.clone()).build()?;
                    return self.add_and_scan(context, id, child);
                }
            }
        }

        let encrypted = self.registry.analyze(Category::EncryptedVolume, &path_spec)?;
        if !encrypted.is_empty() {
            for found in encrypted {
                let child = PathSpec::builder(found).parent(path_spec.clone()).build()?;
                self.add_and_scan(context, id, child)?;
            }
            return Ok(());
        }

        let mut probe_file_systems = true;
        for found in self.registry.analyze(Category::VolumeSystem, &path_spec)? {
            let child = PathSpec::builder(found)
                .location("/")
                .parent(path_spec.clone())
                .build()?;
            self.add_and_scan(context, id, child)?;
            // Shadow copies live inside a volume that also holds a file system.
            if found != TypeIndicator::ShadowStore {
                probe_file_systems = false;
            }
        }

        if probe_file_systems {
            if let Some(found) = self.single_match(Category::FileSystem, &path_spec)? {
                let child = PathSpec::builder(found)
                    .location("/")
                    .parent(path_spec.clone())
                    .build()?;
                context.tree_mut().add_child(id, child);
            }
        }
        Ok(())
    }

    fn scan_volume_system_root(
        &self,
        context: &mut ScanContext,
        id: NodeId,
        path_spec: &PathSpec,
    ) -> Result<(), ScanError> {
        let type_indicator = path_spec.type_indicator();
        let volume_type = type_indicator
            .volume_type()
            .ok_or(ScanError::UnsupportedVolumeSystem(type_indicator))?;
        let prefix = type_indicator.identifier_prefix().unwrap_or_default();

        let volume_system = self.registry.open_volume_system(path_spec)?;
        for native in self.volume_identifiers(volume_system.as_ref()) {
            let identifier = normalize_identifier(&native, prefix);
            let start_offset = find_volume(volume_system.as_ref(), &native, prefix)
                .and_then(|volume| volume.start_offset);
            let child = PathSpec::builder(volume_type)
                .location(volume_location(&identifier))
                .maybe_start_offset(start_offset)
                .parent(path_spec.clone())
                .build()?;
            self.add_and_scan(context, id, child)?;
        }
        Ok(())
    }

    fn add_and_scan(
        &self,
        context: &mut ScanContext,
        parent: NodeId,
        path_spec: PathSpec,
    ) -> Result<(), ScanError> {
        let (child, created) = context.tree_mut().add_child(parent, path_spec);
        if created {
            tracing::trace!(
                "Discovered {} layer",
                context.node(child).type_indicator()
            );
        }
        self.scan_node(context, child)
    }

    /// At most one match is meaningful for image, stream and file system
    /// probes; several point at an ambiguous or damaged source.
    fn single_match(
        &self,
        category: Category,
        path_spec: &PathSpec,
    ) -> Result<Option<TypeIndicator>, ScanError> {
        let found = self.registry.analyze(category, path_spec)?;
        match found.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            several => {
                let names: Vec<&str> = several.iter().map(|t| t.as_str()).collect();
                Err(BackendError::new(format!(
                    "Unsupported source found more than one {:?} type: {}",
                    category,
                    names.join(", ")
                ))
                .into())
            }
        }
    }
}

fn classify_source(source_path: &Path) -> Result<SourceType, ScanError> {
    if is_device_path(source_path) {
        return Ok(SourceType::StorageMediaDevice);
    }

    let metadata = match fs::metadata(source_path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::SourceNotFound(source_path.to_path_buf()))
        }
        Err(err) => return Err(BackendError::from(err).into()),
    };

    if metadata.is_dir() {
        return Ok(SourceType::Directory);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        let file_type = metadata.file_type();
        if file_type.is_block_device() || file_type.is_char_device() {
            return Ok(SourceType::StorageMediaDevice);
        }
    }

    Ok(SourceType::File)
}

fn has_storage_layers(context: &ScanContext) -> bool {
    context.tree().nodes.iter().any(|node| {
        matches!(
            node.type_indicator().category(),
            Category::StorageMediaImage
                | Category::VolumeSystem
                | Category::Volume
                | Category::EncryptedVolume
                | Category::FileSystem
        )
    })
}
