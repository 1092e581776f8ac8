//! A minimal, read-only ZIP reader that extracts a single named entry.
//!
//! Only the End Of Central Directory record, the Central Directory and the Local File Header of
//! the matching entry are parsed. Multi-disk archives, ZIP64, encryption and entries trailed by
//! data descriptors are not supported.

use crate::err::ZipError;
use crate::utils::bytes;
use crate::utils::inflate::inflate;

use log::{debug, trace};

pub const LOCAL_FILE_HEADER_SIG: &[u8; 4] = b"PK\x03\x04";
pub const CENTRAL_DIRECTORY_SIG: &[u8; 4] = b"PK\x01\x02";
pub const END_OF_CENTRAL_DIRECTORY_SIG: &[u8; 4] = b"PK\x05\x06";

const EOCD_LEN: usize = 22;
/// EOCD record plus the longest possible archive comment.
const EOCD_SEARCH_WINDOW: usize = EOCD_LEN + u16::MAX as usize;
const CENTRAL_DIRECTORY_ENTRY_LEN: usize = 46;
const LOCAL_FILE_HEADER_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

/// Fields of a Central Directory entry needed to extract it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CentralDirectoryEntry {
    name: String,
    compression_method: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    local_header_offset: usize,
}

fn truncated(what: &'static str, offset: usize) -> ZipError {
    ZipError::Truncated { what, offset }
}

/// Scan backwards from the end of `data` for the EOCD signature.
fn find_end_of_central_directory(data: &[u8]) -> Option<usize> {
    let last = data.len().checked_sub(EOCD_LEN)?;
    let first = data.len().saturating_sub(EOCD_SEARCH_WINDOW);
    (first..=last)
        .rev()
        .find(|&offset| bytes::read_sig(data, offset).as_ref() == Some(END_OF_CENTRAL_DIRECTORY_SIG))
}

impl CentralDirectoryEntry {
    /// Parse the entry at `offset`, returning it with the offset of the next entry.
    fn parse(data: &[u8], offset: usize) -> Result<(Self, usize), ZipError> {
        let header = bytes::slice(data, offset, CENTRAL_DIRECTORY_ENTRY_LEN)
            .ok_or_else(|| truncated("central directory entry", offset))?;

        let magic = bytes::read_sig(header, 0).unwrap_or_default();
        if &magic != CENTRAL_DIRECTORY_SIG {
            return Err(ZipError::InvalidSignature {
                what: "central directory entry",
                magic,
                offset,
            });
        }

        let field16 = |at: usize| usize::from(bytes::read_u16_le(header, at).unwrap_or(0));
        let field32 = |at: usize| bytes::read_u32_le(header, at).unwrap_or(0) as usize;

        let compression_method = bytes::read_u16_le(header, 10).unwrap_or(0);
        let compressed_size = field32(20);
        let uncompressed_size = field32(24);
        let name_len = field16(28);
        let extra_len = field16(30);
        let comment_len = field16(32);
        let local_header_offset = field32(42);

        let name_offset = offset + CENTRAL_DIRECTORY_ENTRY_LEN;
        let name = bytes::slice(data, name_offset, name_len)
            .ok_or_else(|| truncated("central directory file name", name_offset))?;

        let entry = CentralDirectoryEntry {
            name: String::from_utf8_lossy(name).into_owned(),
            compression_method,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        };
        let next = name_offset + name_len + extra_len + comment_len;
        Ok((entry, next))
    }

    /// Offset of the entry's data, which follows the local header's own name and extra field.
    fn data_offset(&self, data: &[u8]) -> Result<usize, ZipError> {
        let offset = self.local_header_offset;
        let header = bytes::slice(data, offset, LOCAL_FILE_HEADER_LEN)
            .ok_or_else(|| truncated("local file header", offset))?;

        let magic = bytes::read_sig(header, 0).unwrap_or_default();
        if &magic != LOCAL_FILE_HEADER_SIG {
            return Err(ZipError::InvalidSignature {
                what: "local file header",
                magic,
                offset,
            });
        }

        let name_len = usize::from(bytes::read_u16_le(header, 26).unwrap_or(0));
        let extra_len = usize::from(bytes::read_u16_le(header, 28).unwrap_or(0));
        Ok(offset + LOCAL_FILE_HEADER_LEN + name_len + extra_len)
    }

    fn extract(&self, data: &[u8]) -> Result<Vec<u8>, ZipError> {
        let start = self.data_offset(data)?;
        match self.compression_method {
            METHOD_STORED => bytes::slice(data, start, self.uncompressed_size)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| truncated("stored entry data", start)),
            METHOD_DEFLATE => {
                let compressed = bytes::slice(data, start, self.compressed_size)
                    .ok_or_else(|| truncated("deflated entry data", start))?;
                Ok(inflate(compressed)?)
            }
            method => Err(ZipError::UnsupportedCompression {
                name: self.name.clone(),
                method,
            }),
        }
    }
}

/// Extract the decompressed contents of the entry named `name`.
pub fn read_entry(data: &[u8], name: &str) -> Result<Vec<u8>, ZipError> {
    let eocd = find_end_of_central_directory(data)
        .ok_or(ZipError::EndOfCentralDirectoryNotFound)?;

    let entry_count = bytes::read_u16_le(data, eocd + 10)
        .ok_or_else(|| truncated("end of central directory", eocd))?;
    let cd_offset = bytes::read_u32_le(data, eocd + 16)
        .ok_or_else(|| truncated("end of central directory", eocd))? as usize;
    debug!("central directory at {cd_offset} with {entry_count} entries");

    let mut offset = cd_offset;
    for _ in 0..entry_count {
        let (entry, next) = match CentralDirectoryEntry::parse(data, offset) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("stopping central directory walk: {e}");
                break;
            }
        };
        trace!("central directory entry {entry:?}");

        if entry.name == name {
            return entry.extract(data);
        }
        offset = next;
    }

    Err(ZipError::EntryNotFound {
        name: name.to_owned(),
    })
}

/// Like [`read_entry`], but any failure is reported as `None`.
pub fn find_entry(data: &[u8], name: &str) -> Option<Vec<u8>> {
    read_entry(data, name)
        .map_err(|e| debug!("failed to read `{name}`: {e}"))
        .ok()
}
