use std::fmt;

/// Kind of container layer a path specification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeIndicator {
    /// Raw file, directory or device on the host operating system
    Os,
    /// gzip compressed stream
    Gzip,
    /// Raw (dd) storage media image split into segments
    Raw,
    /// Expert Witness Format storage media image
    Ewf,
    /// VMware virtual disk
    Vmdk,
    /// Virtual Hard Disk image
    Vhdi,
    /// Partition table root (MBR/GPT) as seen by the partition backend
    PartitionTable,
    /// Single partition inside a partition table
    Partition,
    /// APFS container holding one or more APFS volumes
    ApfsContainer,
    /// Single APFS volume inside a container
    ApfsVolume,
    /// Volume Shadow Copy store holding the snapshots of a volume
    ShadowStore,
    /// Single Volume Shadow Copy snapshot
    ShadowSnapshot,
    /// BitLocker Drive Encryption volume
    Bde,
    /// FileVault Drive Encryption volume
    Fvde,
    /// LUKS Drive Encryption volume
    Luksde,
    Apfs,
    Ext,
    Fat,
    Hfs,
    Ntfs,
    /// File system read through the generic file-system backend
    Tsk,
}

/// Coarse classification the scanners dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Source,
    CompressedStream,
    StorageMediaImage,
    VolumeSystem,
    Volume,
    EncryptedVolume,
    FileSystem,
}

impl TypeIndicator {
    pub const ALL: [TypeIndicator; 21] = [
        TypeIndicator::Os,
        TypeIndicator::Gzip,
        TypeIndicator::Raw,
        TypeIndicator::Ewf,
        TypeIndicator::Vmdk,
        TypeIndicator::Vhdi,
        TypeIndicator::PartitionTable,
        TypeIndicator::Partition,
        TypeIndicator::ApfsContainer,
        TypeIndicator::ApfsVolume,
        TypeIndicator::ShadowStore,
        TypeIndicator::ShadowSnapshot,
        TypeIndicator::Bde,
        TypeIndicator::Fvde,
        TypeIndicator::Luksde,
        TypeIndicator::Apfs,
        TypeIndicator::Ext,
        TypeIndicator::Fat,
        TypeIndicator::Hfs,
        TypeIndicator::Ntfs,
        TypeIndicator::Tsk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeIndicator::Os => "OS",
            TypeIndicator::Gzip => "GZIP",
            TypeIndicator::Raw => "RAW",
            TypeIndicator::Ewf => "EWF",
            TypeIndicator::Vmdk => "VMDK",
            TypeIndicator::Vhdi => "VHDI",
            TypeIndicator::PartitionTable => "PARTITION_TABLE",
            TypeIndicator::Partition => "PARTITION",
            TypeIndicator::ApfsContainer => "APFS_CONTAINER",
            TypeIndicator::ApfsVolume => "APFS_VOLUME",
            TypeIndicator::ShadowStore => "VSHADOW_STORE",
            TypeIndicator::ShadowSnapshot => "VSHADOW_SNAPSHOT",
            TypeIndicator::Bde => "BDE",
            TypeIndicator::Fvde => "FVDE",
            TypeIndicator::Luksde => "LUKSDE",
            TypeIndicator::Apfs => "APFS",
            TypeIndicator::Ext => "EXT",
            TypeIndicator::Fat => "FAT",
            TypeIndicator::Hfs => "HFS",
            TypeIndicator::Ntfs => "NTFS",
            TypeIndicator::Tsk => "TSK",
        }
    }

    /// Parse the upper-case name produced by [`TypeIndicator::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    pub fn category(self) -> Category {
        match self {
            TypeIndicator::Os => Category::Source,
            TypeIndicator::Gzip => Category::CompressedStream,
            TypeIndicator::Raw | TypeIndicator::Ewf | TypeIndicator::Vmdk | TypeIndicator::Vhdi => {
                Category::StorageMediaImage
            }
            TypeIndicator::PartitionTable
            | TypeIndicator::ApfsContainer
            | TypeIndicator::ShadowStore => Category::VolumeSystem,
            TypeIndicator::Partition | TypeIndicator::ApfsVolume | TypeIndicator::ShadowSnapshot => {
                Category::Volume
            }
            TypeIndicator::Bde | TypeIndicator::Fvde | TypeIndicator::Luksde => {
                Category::EncryptedVolume
            }
            TypeIndicator::Apfs
            | TypeIndicator::Ext
            | TypeIndicator::Fat
            | TypeIndicator::Hfs
            | TypeIndicator::Ntfs
            | TypeIndicator::Tsk => Category::FileSystem,
        }
    }

    pub fn is_file_system(self) -> bool {
        self.category() == Category::FileSystem
    }

    pub fn is_volume_system(self) -> bool {
        self.category() == Category::VolumeSystem
    }

    /// Volume type produced by a volume system type.
    pub fn volume_type(self) -> Option<TypeIndicator> {
        match self {
            TypeIndicator::PartitionTable => Some(TypeIndicator::Partition),
            TypeIndicator::ApfsContainer => Some(TypeIndicator::ApfsVolume),
            TypeIndicator::ShadowStore => Some(TypeIndicator::ShadowSnapshot),
            _ => None,
        }
    }

    /// Parent type a volume type must be chained to.
    pub fn required_parent(self) -> Option<TypeIndicator> {
        match self {
            TypeIndicator::Partition => Some(TypeIndicator::PartitionTable),
            TypeIndicator::ApfsVolume => Some(TypeIndicator::ApfsContainer),
            TypeIndicator::ShadowSnapshot => Some(TypeIndicator::ShadowStore),
            _ => None,
        }
    }

    /// Prefix of canonical volume identifiers (`p1`, `apfs2`, `vss3`).
    /// Defined for both the volume system and its volumes.
    pub fn identifier_prefix(self) -> Option<&'static str> {
        match self {
            TypeIndicator::PartitionTable | TypeIndicator::Partition => Some("p"),
            TypeIndicator::ApfsContainer | TypeIndicator::ApfsVolume => Some("apfs"),
            TypeIndicator::ShadowStore | TypeIndicator::ShadowSnapshot => Some("vss"),
            _ => None,
        }
    }
}

impl fmt::Display for TypeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
