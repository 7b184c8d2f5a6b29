//! GGUF header sniffing
//!
//! Only the first eight bytes are inspected: the four-byte `GGUF` magic and
//! the little-endian `u32` format version that follows it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::constants::discovery::{GGUF_MAGIC, HEADER_LEN, MAX_GGUF_VERSION, MIN_GGUF_VERSION};

/// Classification of a file's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    /// GGUF magic with a version the scan accepts
    Supported { version: u32 },
    /// GGUF magic, but a version newer than the accepted range
    TooNew { version: u32 },
    /// GGUF magic with a version below the accepted range (e.g. 0)
    Unsupported { version: u32 },
    /// Not a GGUF file, or shorter than the header
    NotGguf,
}

/// Classify an in-memory header
pub fn classify_header(header: &[u8]) -> HeaderCheck {
    if header.len() < HEADER_LEN || header[..4] != GGUF_MAGIC {
        return HeaderCheck::NotGguf;
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version > MAX_GGUF_VERSION {
        HeaderCheck::TooNew { version }
    } else if version < MIN_GGUF_VERSION {
        HeaderCheck::Unsupported { version }
    } else {
        HeaderCheck::Supported { version }
    }
}

/// Read and classify the header of the file at `path`
pub fn read_header(path: &Path) -> io::Result<HeaderCheck> {
    let mut header = [0u8; HEADER_LEN];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(classify_header(&header)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(HeaderCheck::NotGguf),
        Err(e) => Err(e),
    }
}
