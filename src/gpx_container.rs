//! The middle generation (GPX) container.
//!
//! A `BCFZ` file is a `BCFS` container compressed with deflate behind an 8-byte header
//! (`BCFZ` + declared decompressed size). The GPIF document is embedded somewhere in the `BCFS`
//! payload, so it is found by a text search instead of walking the container's sectors.

use crate::err::{Result, TabError};
use crate::utils::bytes;
use crate::utils::inflate::inflate;

use log::{debug, trace};
use std::borrow::Cow;

pub const BCFZ_MAGIC: &[u8; 4] = b"BCFZ";
pub const BCFS_MAGIC: &[u8; 4] = b"BCFS";

const BCFZ_HEADER_LEN: usize = 8;

/// Decompress a `BCFZ` buffer into its `BCFS` payload.
///
/// Buffers that are already `BCFS` are borrowed unchanged.
pub fn decompress_container(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if bytes::read_sig(data, 0).as_ref() != Some(BCFZ_MAGIC) {
        return Ok(Cow::Borrowed(data));
    }

    let declared = bytes::read_u32_le(data, 4).unwrap_or(0);
    let payload = data.get(BCFZ_HEADER_LEN..).unwrap_or_default();
    trace!(
        "BCFZ declares {declared} decompressed bytes, {} compressed",
        payload.len()
    );

    let out = inflate(payload).map_err(|source| TabError::ContainerCorrupt { source })?;
    if out.len() != declared as usize {
        debug!(
            "BCFZ declared size {declared} differs from actual {}",
            out.len()
        );
    }
    Ok(Cow::Owned(out))
}

/// Find the span starting at `open` and ending after the first `close` that follows it.
fn span<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)?;
    let end = text[start..].find(close)? + start + close.len();
    Some(&text[start..end])
}

/// Locate the GPIF metadata document inside a decompressed container.
///
/// Tried in order: a `<Score>` element, a `<GPIF>` element (running to the end of the text
/// when unterminated), then everything from the `<?xml` declaration on.
pub fn locate_gpif(container: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(container);

    if let Some(score) = span(&text, "<Score>", "</Score>") {
        debug!("located <Score> span of {} bytes", score.len());
        return Some(score.to_owned());
    }

    if let Some(start) = text.find("<GPIF") {
        let gpif = match span(&text[start..], "<GPIF", "</GPIF>") {
            Some(gpif) => gpif,
            None => &text[start..],
        };
        debug!("located <GPIF> span of {} bytes", gpif.len());
        return Some(gpif.to_owned());
    }

    if let Some(start) = text.find("<?xml") {
        let rest = &text[start..];
        let end = rest.rfind("</GPIF>").map_or(rest.len(), |i| i + "</GPIF>".len());
        debug!("located <?xml span of {end} bytes");
        return Some(rest[..end].to_owned());
    }

    None
}
