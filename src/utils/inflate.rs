use crate::err::InflateError;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use log::debug;
use std::io::{self, Read};

fn inflate_raw(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn inflate_zlib(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Decompress `data`, trying a headerless deflate stream first and a zlib-wrapped one second.
///
/// The first attempt that produces a non-empty output wins.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>, InflateError> {
    let attempts: [(&str, fn(&[u8]) -> io::Result<Vec<u8>>); 2] =
        [("raw deflate", inflate_raw), ("zlib", inflate_zlib)];

    for (name, attempt) in attempts {
        match attempt(data) {
            Ok(out) if !out.is_empty() => {
                debug!("inflated {} bytes into {} using {name}", data.len(), out.len());
                return Ok(out);
            }
            Ok(_) => debug!("{name} produced no output"),
            Err(e) => debug!("{name} failed: {e}"),
        }
    }

    Err(InflateError::Exhausted {
        input_len: data.len(),
    })
}
