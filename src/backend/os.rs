use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{location_segments, FileSystem, FileSystemOpener, ReadSeek};
use crate::error::BackendError;
use crate::path::{PathSpec, TypeIndicator};

/// Byte range of a raw source file, optionally narrowed to a partition.
///
/// Only layers that are plain byte ranges of the host file resolve to a
/// source: the OS file itself, raw images, partition tables and partitions
/// with a start offset. Everything else needs a format backend.
pub struct ByteSource {
    reader: BufReader<File>,
    start: u64,
    size: u64,
    pos: u64,
}

impl ByteSource {
    pub fn open(path_spec: &PathSpec) -> Result<Option<ByteSource>, BackendError> {
        match path_spec.type_indicator() {
            TypeIndicator::Os => {
                let Some(location) = path_spec.location() else {
                    return Err(BackendError::new("OS path specification without location"));
                };
                let metadata = std::fs::metadata(location)?;
                if metadata.is_dir() {
                    return Ok(None);
                }
                let file = File::open(location)?;
                Ok(Some(ByteSource {
                    reader: BufReader::new(file),
                    start: 0,
                    size: metadata.len(),
                    pos: 0,
                }))
            }
            TypeIndicator::Raw | TypeIndicator::PartitionTable => match path_spec.parent() {
                Some(parent) => ByteSource::open(parent),
                None => Ok(None),
            },
            TypeIndicator::Partition => {
                let Some(table) = path_spec.parent() else {
                    return Ok(None);
                };
                let Some(source) = ByteSource::open(table)? else {
                    return Ok(None);
                };
                let offset = path_spec.start_offset().unwrap_or(0);
                source.narrow(offset).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Restrict the source to the bytes starting at `offset`.
    fn narrow(mut self, offset: u64) -> Result<ByteSource, BackendError> {
        if offset > self.size {
            return Err(BackendError::new(format!(
                "Start offset 0x{:08x} beyond end of data (0x{:08x})",
                offset, self.size
            )));
        }
        self.start += offset;
        self.size -= offset;
        self.pos = 0;
        self.reader.seek(SeekFrom::Start(self.start))?;
        Ok(self)
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let max = (buf.len() as u64).min(remaining) as usize;
        if max == 0 {
            return Ok(0);
        }
        let n = self.reader.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of byte source",
            ));
        };
        self.reader.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}

/// Directory on the host presented as a file system.
pub struct OsFileSystem {
    root: PathBuf,
}

impl OsFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn host_path(&self, location: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in location_segments(location) {
            path.push(segment);
        }
        path
    }
}

impl FileSystem for OsFileSystem {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::Os
    }

    fn list_directory(&mut self, location: &str) -> Result<Option<Vec<String>>, BackendError> {
        let path = self.host_path(location);
        if !path.is_dir() {
            return Ok(None);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(Some(names))
    }

    fn open_file(&mut self, location: &str) -> Result<Option<Box<dyn ReadSeek>>, BackendError> {
        let path = self.host_path(location);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        Ok(Some(Box::new(BufReader::new(file))))
    }
}

/// Opens OS path specifications that name a directory.
pub struct OsFileSystemOpener;

impl FileSystemOpener for OsFileSystemOpener {
    fn open(&self, path_spec: &PathSpec) -> Result<Box<dyn FileSystem>, BackendError> {
        if path_spec.type_indicator() != TypeIndicator::Os {
            return Err(BackendError::new(format!(
                "Unsupported path specification type: {}",
                path_spec.type_indicator()
            )));
        }
        let location = path_spec.location().unwrap_or_default();
        if !Path::new(location).is_dir() {
            return Err(BackendError::new(format!(
                "Not a directory: {}",
                location
            )));
        }
        Ok(Box::new(OsFileSystem::new(location)))
    }
}
