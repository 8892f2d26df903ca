//! Stream decompressors used by compressed-stream layers.
//!
//! A decompressor is fed chunks of compressed data and returns the data it
//! could inflate plus whatever input lies past the end of the compressed
//! stream. Malformed input is a [`BackendError`].

use std::fmt;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::BackendError;

/// Output buffer size per inflate call.
const INFLATE_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// DEFLATE wrapped in a zlib header and checksum
    Zlib,
    /// Raw DEFLATE without zlib header
    Deflate,
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Zlib => f.write_str("zlib"),
            CompressionMethod::Deflate => f.write_str("deflate"),
        }
    }
}

pub trait Decompressor {
    fn method(&self) -> CompressionMethod;

    /// Returns the uncompressed data and the input remaining after the end
    /// of the compressed stream.
    fn decompress(&mut self, compressed: &[u8]) -> Result<(Vec<u8>, Vec<u8>), BackendError>;
}

/// Build a fresh decompressor for the given method.
pub fn new_decompressor(method: CompressionMethod) -> Box<dyn Decompressor> {
    match method {
        CompressionMethod::Zlib => Box::new(ZlibDecompressor::new()),
        CompressionMethod::Deflate => Box::new(DeflateDecompressor::new()),
    }
}

/// DEFLATE with zlib header.
pub struct ZlibDecompressor {
    inner: Decompress,
    method: CompressionMethod,
    finished: bool,
}

impl ZlibDecompressor {
    pub fn new() -> Self {
        Self::with_header(true)
    }

    fn with_header(zlib_header: bool) -> Self {
        let method = if zlib_header {
            CompressionMethod::Zlib
        } else {
            CompressionMethod::Deflate
        };
        Self {
            inner: Decompress::new(zlib_header),
            method,
            finished: false,
        }
    }

    /// Whether the end of the compressed stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Default for ZlibDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for ZlibDecompressor {
    fn method(&self) -> CompressionMethod {
        self.method
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<(Vec<u8>, Vec<u8>), BackendError> {
        if self.finished {
            return Ok((Vec::new(), compressed.to_vec()));
        }

        let mut output = Vec::with_capacity(compressed.len().saturating_mul(2));
        let mut buf = vec![0u8; INFLATE_CHUNK_SIZE];
        let mut in_pos: usize = 0;

        loop {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();

            let status = self
                .inner
                .decompress(&compressed[in_pos..], &mut buf, FlushDecompress::None)
                .map_err(|e| {
                    BackendError::with_source(
                        format!(
                            "Unable to decompress {} compressed stream with error: {}.",
                            self.method, e
                        ),
                        e,
                    )
                })?;

            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;
            in_pos += consumed;
            output.extend_from_slice(&buf[..produced]);

            match status {
                Status::StreamEnd => {
                    self.finished = true;
                    return Ok((output, compressed[in_pos..].to_vec()));
                }
                Status::Ok | Status::BufError => {
                    // Out of input and the output buffer was not filled:
                    // nothing more until the next chunk arrives.
                    if consumed == 0 && produced == 0 {
                        break;
                    }
                    if in_pos >= compressed.len() && produced < buf.len() {
                        break;
                    }
                }
            }
        }

        Ok((output, Vec::new()))
    }
}

/// Raw DEFLATE. Same behavior as [`ZlibDecompressor`] without the header.
pub struct DeflateDecompressor(ZlibDecompressor);

impl DeflateDecompressor {
    pub fn new() -> Self {
        Self(ZlibDecompressor::with_header(false))
    }
}

impl Default for DeflateDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for DeflateDecompressor {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<(Vec<u8>, Vec<u8>), BackendError> {
        self.0.decompress(compressed)
    }
}
