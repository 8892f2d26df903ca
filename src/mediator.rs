use crate::backend::VolumeSystem;
use crate::credentials::{CredentialKind, Credentials};
use crate::scanner::{Cancelled, NodeId, ScanContext, ScanMediator, SourceScanner};

/// Answer to one kind of volume selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    None,
    /// These identifiers, bare numerals allowed
    Only(Vec<String>),
    /// Abort the scan when asked
    Cancel,
}

impl Selection {
    /// Parse `all`, `none`, `cancel` or a comma separated identifier list.
    pub fn parse(text: &str) -> Selection {
        match text.trim().to_ascii_lowercase().as_str() {
            "all" => Selection::All,
            "none" | "" => Selection::None,
            "cancel" => Selection::Cancel,
            _ => Selection::Only(
                text.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    fn apply(&self, offered: &[String]) -> Result<Option<Vec<String>>, Cancelled> {
        match self {
            Selection::All => Ok(Some(offered.to_vec())),
            Selection::None => Ok(None),
            Selection::Only(ids) => Ok(Some(ids.clone())),
            Selection::Cancel => Err(Cancelled),
        }
    }
}

/// Non-interactive mediator answering from preset selections and trying a
/// fixed list of credentials on every locked volume.
#[derive(Default)]
pub struct ScriptedMediator {
    pub partitions: Selection,
    pub apfs_volumes: Selection,
    pub shadow_stores: Selection,
    credentials: Vec<(CredentialKind, Vec<u8>)>,
}

impl ScriptedMediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partitions(mut self, selection: Selection) -> Self {
        self.partitions = selection;
        self
    }

    pub fn apfs_volumes(mut self, selection: Selection) -> Self {
        self.apfs_volumes = selection;
        self
    }

    pub fn shadow_stores(mut self, selection: Selection) -> Self {
        self.shadow_stores = selection;
        self
    }

    /// Add a credential tried, in insertion order, on locked volumes that
    /// accept its kind.
    pub fn credential(mut self, kind: CredentialKind, value: impl Into<Vec<u8>>) -> Self {
        self.credentials.push((kind, value.into()));
        self
    }
}

impl ScanMediator for ScriptedMediator {
    fn select_apfs_volumes(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.apfs_volumes.apply(identifiers)
    }

    fn select_partitions(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.partitions.apply(identifiers)
    }

    fn select_shadow_stores(
        &mut self,
        _volume_system: &dyn VolumeSystem,
        identifiers: &[String],
    ) -> Result<Option<Vec<String>>, Cancelled> {
        self.shadow_stores.apply(identifiers)
    }

    fn unlock_volume(
        &mut self,
        scanner: &SourceScanner,
        context: &ScanContext,
        locked_node: NodeId,
        credential_kinds: &[CredentialKind],
    ) -> Result<bool, Cancelled> {
        let path_spec = &context.node(locked_node).path_spec;
        for (kind, value) in &self.credentials {
            if !credential_kinds.contains(kind) {
                continue;
            }
            let credentials = Credentials::new(path_spec.clone()).with(*kind, value.clone());
            match scanner.unlock(path_spec, credentials) {
                Ok(true) => return Ok(true),
                Ok(false) => tracing::info!("{} rejected", kind),
                Err(err) => tracing::warn!("Unable to unlock with {}: {}", kind, err),
            }
        }
        Ok(false)
    }
}
