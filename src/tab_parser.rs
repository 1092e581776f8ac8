use crate::err::{Result, TabError};
use crate::gpif::extract_metadata;
use crate::gpx_container::{BCFS_MAGIC, BCFZ_MAGIC, decompress_container, locate_gpif};
use crate::legacy_header::decode_legacy_header;
use crate::metadata::TabMetadata;
use crate::utils::StringDecoder;
use crate::utils::byte_cursor::DEFAULT_MAX_STRING_LEN;
use crate::utils::bytes;
use crate::zip_reader::{self, LOCAL_FILE_HEADER_SIG};

use encoding::EncodingRef;
use log::{debug, warn};
use std::fmt;
use std::fs;
use std::path::Path;

/// Inputs shorter than this are not even probed.
pub const MIN_FILE_LEN: usize = 32;

/// The entry holding the GPIF document in GP7+ archives.
pub const GPIF_ENTRY_PATH: &str = "Content/score.gpif";

const DEFAULT_MAX_NOTICE_COUNT: usize = 100;

/// The file layout, as told by the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    TooShort,
    /// GP7 and later: a ZIP archive.
    Zip,
    /// GPX: a `BCFZ` (compressed) or `BCFS` container.
    Gpx { compressed: bool },
    /// GP3 to GP5.
    FixedLayout,
}

impl FileFormat {
    pub fn detect(data: &[u8]) -> Self {
        if data.len() < MIN_FILE_LEN {
            return FileFormat::TooShort;
        }

        match bytes::read_sig(data, 0) {
            Some(ref magic) if magic == LOCAL_FILE_HEADER_SIG => FileFormat::Zip,
            Some(ref magic) if magic == BCFZ_MAGIC => FileFormat::Gpx { compressed: true },
            Some(ref magic) if magic == BCFS_MAGIC => FileFormat::Gpx { compressed: false },
            _ => FileFormat::FixedLayout,
        }
    }

    /// The `version` a record of this format is tagged with when parsing fails.
    pub fn version_label(&self) -> &'static str {
        match self {
            FileFormat::Zip => "GP7+",
            FileFormat::Gpx { .. } => "GPX",
            FileFormat::TooShort | FileFormat::FixedLayout => "",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::TooShort => f.write_str("unrecognized"),
            FileFormat::Zip => f.write_str("GP7+ (zip)"),
            FileFormat::Gpx { compressed: true } => f.write_str("GPX (BCFZ)"),
            FileFormat::Gpx { compressed: false } => f.write_str("GPX (BCFS)"),
            FileFormat::FixedLayout => f.write_str("GP3-GP5"),
        }
    }
}

#[derive(Clone)]
pub struct ParserSettings {
    /// Code page tried between UTF-8 and Latin-1 when decoding header strings.
    legacy_codec: EncodingRef,
    /// Upper bound on the notices read from a fixed-layout header.
    max_notice_count: usize,
    /// Longest length-prefixed string accepted in a fixed-layout header.
    max_string_len: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            legacy_codec: encoding::all::GBK,
            max_notice_count: DEFAULT_MAX_NOTICE_COUNT,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

impl fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("legacy_codec", &self.legacy_codec.name())
            .field("max_notice_count", &self.max_notice_count)
            .field("max_string_len", &self.max_string_len)
            .finish()
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn legacy_codec(mut self, codec: EncodingRef) -> Self {
        self.legacy_codec = codec;
        self
    }

    pub fn max_notice_count(mut self, max_notice_count: usize) -> Self {
        self.max_notice_count = max_notice_count;
        self
    }

    pub fn max_string_len(mut self, max_string_len: usize) -> Self {
        self.max_string_len = max_string_len;
        self
    }

    pub fn get_legacy_codec(&self) -> EncodingRef {
        self.legacy_codec
    }

    pub fn get_max_notice_count(&self) -> usize {
        self.max_notice_count
    }

    pub fn get_max_string_len(&self) -> usize {
        self.max_string_len
    }

    pub fn string_decoder(&self) -> StringDecoder {
        StringDecoder::with_legacy_codec(self.legacy_codec)
    }
}

/// Metadata parser over a fully buffered tablature file.
#[derive(Debug, Clone)]
pub struct TabParser {
    data: Vec<u8>,
    config: ParserSettings,
}

impl TabParser {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| TabError::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(TabParser::from_buffer(data))
    }

    pub fn from_buffer(data: Vec<u8>) -> Self {
        TabParser {
            data,
            config: ParserSettings::default(),
        }
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn format(&self) -> FileFormat {
        FileFormat::detect(&self.data)
    }

    /// Parse the metadata, reporting why it could not be extracted.
    pub fn try_metadata(&self) -> Result<TabMetadata> {
        let data = self.data.as_slice();
        let format = FileFormat::detect(data);
        debug!("detected format {format}");

        let metadata = match format {
            FileFormat::TooShort => {
                return Err(TabError::TooShort {
                    len: data.len(),
                    min: MIN_FILE_LEN,
                });
            }
            FileFormat::Zip => {
                let document = zip_reader::read_entry(data, GPIF_ENTRY_PATH)?;
                extract_metadata(&String::from_utf8_lossy(&document))
            }
            FileFormat::Gpx { .. } => {
                let container = decompress_container(data)?;
                let document = locate_gpif(&container).ok_or(TabError::MetadataNotLocated)?;
                extract_metadata(&document)
            }
            FileFormat::FixedLayout => return Ok(decode_legacy_header(data, &self.config)),
        };

        Ok(TabMetadata {
            version: format.version_label().to_owned(),
            ..metadata
        })
    }

    /// Parse the metadata. Never fails: unusable input yields the sentinel record.
    pub fn metadata(&self) -> TabMetadata {
        self.try_metadata().unwrap_or_else(|e| {
            let format = self.format();
            warn!("falling back to an empty {format} record: {e}");
            TabMetadata::sentinel(format.version_label())
        })
    }
}

/// Parse the metadata of `data` with default settings. Never fails.
pub fn parse_metadata(data: &[u8]) -> TabMetadata {
    TabParser::from_buffer(data.to_vec()).metadata()
}
