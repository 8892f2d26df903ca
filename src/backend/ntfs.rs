use std::io::{Cursor, Read};

use ntfs::indexes::NtfsFileNameIndex;
use ntfs::structured_values::NtfsFileNamespace;
use ntfs::{Ntfs, NtfsFile};

use super::os::ByteSource;
use super::{location_segments, FileSystem, FileSystemOpener, FormatAnalyzer, ReadSeek};
use crate::error::BackendError;
use crate::path::{PathSpec, TypeIndicator};

fn ntfs_error(context: &str, err: ntfs::NtfsError) -> BackendError {
    BackendError::new(format!("{}: {}", context, err))
}

/// Detects NTFS on layers that map to a plain byte range of the source.
pub struct NtfsAnalyzer;

impl FormatAnalyzer for NtfsAnalyzer {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Ntfs
    }

    fn analyze(&self, path_spec: &PathSpec) -> Result<bool, BackendError> {
        let Some(mut source) = ByteSource::open(path_spec)? else {
            return Ok(false);
        };
        // Any boot sector the parser rejects is simply not NTFS.
        Ok(Ntfs::new(&mut source).is_ok())
    }
}

/// NTFS volume opened through the `ntfs` crate.
pub struct NtfsFileSystem {
    ntfs: Ntfs,
    reader: ByteSource,
}

impl NtfsFileSystem {
    pub fn open(mut reader: ByteSource) -> Result<Self, BackendError> {
        let mut ntfs =
            Ntfs::new(&mut reader).map_err(|e| ntfs_error("Unable to open NTFS volume", e))?;
        // Needed for case-insensitive name lookups.
        ntfs.read_upcase_table(&mut reader)
            .map_err(|e| ntfs_error("Unable to read $UpCase", e))?;
        Ok(Self { ntfs, reader })
    }
}

/// Walk `location` from the root directory.
fn find_file<'n>(
    ntfs: &'n Ntfs,
    reader: &mut ByteSource,
    location: &str,
) -> Result<Option<NtfsFile<'n>>, ntfs::NtfsError> {
    let mut current = ntfs.root_directory(reader)?;

    for segment in location_segments(location) {
        if !current.is_directory() {
            return Ok(None);
        }
        let next = {
            let index = current.directory_index(reader)?;
            let mut finder = index.finder();
            match NtfsFileNameIndex::find(&mut finder, ntfs, reader, segment) {
                Some(entry) => entry?.to_file(ntfs, reader)?,
                None => return Ok(None),
            }
        };
        current = next;
    }

    Ok(Some(current))
}

impl FileSystem for NtfsFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Ntfs
    }

    fn list_directory(&mut self, location: &str) -> Result<Option<Vec<String>>, BackendError> {
        let context = "Unable to list NTFS directory";
        let Some(directory) = find_file(&self.ntfs, &mut self.reader, location)
            .map_err(|e| ntfs_error(context, e))?
        else {
            return Ok(None);
        };
        if !directory.is_directory() {
            return Ok(None);
        }

        let index = directory
            .directory_index(&mut self.reader)
            .map_err(|e| ntfs_error(context, e))?;
        let mut entries = index.entries();
        let mut names = Vec::new();

        while let Some(entry) = entries.next(&mut self.reader) {
            let entry = entry.map_err(|e| ntfs_error(context, e))?;
            let Some(key) = entry.key() else {
                continue;
            };
            let file_name = key.map_err(|e| ntfs_error(context, e))?;

            // 8.3 short names duplicate the long name of the same record
            if file_name.namespace() == NtfsFileNamespace::Dos {
                continue;
            }
            let name = file_name.name().to_string_lossy();
            if name != "." {
                names.push(name);
            }
        }

        names.sort();
        names.dedup();
        Ok(Some(names))
    }

    fn open_file(&mut self, location: &str) -> Result<Option<Box<dyn ReadSeek>>, BackendError> {
        let context = "Unable to read NTFS file";
        let Some(file) = find_file(&self.ntfs, &mut self.reader, location)
            .map_err(|e| ntfs_error(context, e))?
        else {
            return Ok(None);
        };
        if file.is_directory() {
            return Ok(None);
        }

        let mut data = Vec::new();
        if let Some(item) = file.data(&mut self.reader, "") {
            let item = item.map_err(|e| ntfs_error(context, e))?;
            let attribute = item.to_attribute().map_err(|e| ntfs_error(context, e))?;
            let value = attribute
                .value(&mut self.reader)
                .map_err(|e| ntfs_error(context, e))?;
            value.attach(&mut self.reader).read_to_end(&mut data)?;
        }

        Ok(Some(Box::new(Cursor::new(data))))
    }
}

/// Opens NTFS path specifications whose parent maps to a byte range.
pub struct NtfsFileSystemOpener;

impl FileSystemOpener for NtfsFileSystemOpener {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn FileSystem>, BackendError> {
        let Some(parent) = path_spec.parent() else {
            return Err(BackendError::new("NTFS path specification without parent"));
        };
        let Some(reader) = ByteSource::open(parent)? else {
            return Err(BackendError::new(format!(
                "Unable to read NTFS volume inside {} layer",
                parent.type_indicator()
            )));
        };
        Ok(Box::new(NtfsFileSystem::open(reader)?))
    }
}
