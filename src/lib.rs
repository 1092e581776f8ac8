#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub mod err;
pub mod gpif;
pub mod gpx_container;
pub mod legacy_header;
pub mod metadata;
pub mod tab_parser;
pub mod zip_reader;

mod utils;

pub use err::{InflateError, TabError, ZipError};
pub use legacy_header::Generation;
pub use metadata::TabMetadata;
pub use tab_parser::{FileFormat, GPIF_ENTRY_PATH, MIN_FILE_LEN, ParserSettings, TabParser, parse_metadata};
pub use utils::{DecodeStrategy, StringDecoder, decode_string};
