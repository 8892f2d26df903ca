use std::collections::HashMap;
use std::fmt;

use crate::path::{PathSpec, TypeIndicator};

/// Kind of secret an encrypted format accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Password,
    RecoveryPassword,
    StartupKey,
    KeyData,
    EncryptedRootPlist,
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Password => "password",
            CredentialKind::RecoveryPassword => "recovery_password",
            CredentialKind::StartupKey => "startup_key",
            CredentialKind::KeyData => "key_data",
            CredentialKind::EncryptedRootPlist => "encrypted_root_plist",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secrets for exactly one locked path specification.
///
/// Handed by value to the unlock call and dropped afterwards. `Debug` never
/// prints the values.
pub struct Credentials {
    path_spec: PathSpec,
    values: Vec<(CredentialKind, Vec<u8>)>,
}

impl Credentials {
    pub fn new(path_spec: PathSpec) -> Self {
        Self {
            path_spec,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, kind: CredentialKind, value: impl Into<Vec<u8>>) -> Self {
        self.values.push((kind, value.into()));
        self
    }

    pub fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    pub fn kinds(&self) -> impl Iterator<Item = CredentialKind> + '_ {
        self.values.iter().map(|(kind, _)| *kind)
    }

    pub fn get(&self, kind: CredentialKind) -> Option<&[u8]> {
        self.values
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("type", &self.path_spec.type_indicator())
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

/// Source of the credential kinds a locked layer accepts.
pub trait CredentialsProvider {
    /// Empty when the layer is not an encryptable format.
    fn credential_kinds(&self, path_spec: &PathSpec) -> Vec<CredentialKind>;
}

/// Credential kinds keyed by format.
#[derive(Debug, Clone)]
pub struct CredentialsManager {
    kinds: HashMap<TypeIndicator, Vec<CredentialKind>>,
}

impl CredentialsManager {
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_indicator: TypeIndicator, kinds: &[CredentialKind]) {
        self.kinds.insert(type_indicator, kinds.to_vec());
    }
}

impl Default for CredentialsManager {
    fn default() -> Self {
        use CredentialKind::*;

        let mut manager = Self::empty();
        manager.register(
            TypeIndicator::Bde,
            &[Password, RecoveryPassword, StartupKey, KeyData],
        );
        manager.register(
            TypeIndicator::Fvde,
            &[EncryptedRootPlist, Password, RecoveryPassword, KeyData],
        );
        manager.register(TypeIndicator::Luksde, &[Password, KeyData]);
        manager.register(TypeIndicator::ApfsVolume, &[Password, RecoveryPassword]);
        manager
    }
}

impl CredentialsProvider for CredentialsManager {
    fn credential_kinds(&self, path_spec: &PathSpec) -> Vec<CredentialKind> {
        self.kinds
            .get(&path_spec.type_indicator())
            .cloned()
            .unwrap_or_default()
    }
}
