//! Header decoder for the fixed-layout generations (GP3, GP4, GP5).
//!
//! These files start with a version string in a 30-byte slot, followed by the song information
//! as a run of length-prefixed strings. Nothing in the layout is self-describing, so the version
//! string decides which fields exist, and every field must be consumed in order to reach the
//! tempo.
//!
//! Only the header is decoded. The track/measure body that follows is not, so track names are
//! never reported for these generations.

use crate::metadata::{TabMetadata, clamp_tempo};
use crate::tab_parser::ParserSettings;
use crate::utils::ByteCursor;

use log::{debug, trace};

const VERSION_SLOT_LEN: usize = 30;
const LYRICS_LINES: usize = 5;
const PAGE_SETUP_STRINGS: usize = 11;

/// The fixed-layout generation, derived from the version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Gp3,
    Gp4,
    Gp5,
}

impl Generation {
    /// Classify a version string such as `FICHIER GUITAR PRO v5.00`.
    pub fn from_version_string(version: &str) -> Self {
        if version.contains("5.") {
            Generation::Gp5
        } else if version.contains("4.") {
            Generation::Gp4
        } else {
            Generation::Gp3
        }
    }

    fn has_words_field(self) -> bool {
        self == Generation::Gp5
    }

    /// Consume everything between the notices and the tempo, then read the tempo.
    fn read_tempo(self, cursor: &mut ByteCursor<'_>) -> i32 {
        match self {
            Generation::Gp3 => cursor.i32(),
            Generation::Gp4 => {
                skip_lyrics(cursor);
                cursor.i32()
            }
            Generation::Gp5 => {
                skip_lyrics(cursor);
                for _ in 0..PAGE_SETUP_STRINGS {
                    cursor.double_prefixed_string();
                }
                let tempo_name = cursor.double_prefixed_string();
                trace!("tempo name: {tempo_name:?}");
                cursor.i32()
            }
        }
    }
}

/// The numeric part of a version string (`FICHIER GUITAR PRO v3.00` -> `3.00`).
fn version_number(version: &str) -> String {
    let version = version.trim();
    match version.rfind('v') {
        Some(idx) if idx + 1 < version.len() => version[idx + 1..].trim().to_owned(),
        _ => version.to_owned(),
    }
}

/// Lyrics track index, then five `(start bar, text)` lines.
fn skip_lyrics(cursor: &mut ByteCursor<'_>) {
    let _track = cursor.i32();
    for _ in 0..LYRICS_LINES {
        let _start_bar = cursor.i32();
        cursor.len_prefixed_string();
    }
}

fn skip_notices(cursor: &mut ByteCursor<'_>, max_notice_count: usize) {
    let declared = cursor.i32();
    let count = usize::try_from(declared).unwrap_or(0).min(max_notice_count);
    if count as i64 != i64::from(declared) {
        debug!("notice count {declared} out of range, reading {count}");
    }

    for _ in 0..count {
        if cursor.is_eof() {
            break;
        }
        cursor.double_prefixed_string();
    }
}

/// Decode the header of a fixed-layout file.
///
/// Never fails: fields that cannot be read are left at their defaults, and whatever was read
/// before a corrupt region is kept.
pub(crate) fn decode_legacy_header(data: &[u8], settings: &ParserSettings) -> TabMetadata {
    let mut cursor = ByteCursor::new(data)
        .with_decoder(settings.string_decoder())
        .with_max_string_len(settings.get_max_string_len());

    let version_len = usize::from(cursor.u8());
    let slot = cursor.take_bytes(VERSION_SLOT_LEN);
    let version_string = cursor.decode(&slot[..version_len.min(slot.len())]);
    let generation = Generation::from_version_string(&version_string);
    debug!("version string {version_string:?} classified as {generation:?}");

    let title = cursor.double_prefixed_string();
    let _subtitle = cursor.double_prefixed_string();
    let artist = cursor.double_prefixed_string();
    let album = cursor.double_prefixed_string();
    if generation.has_words_field() {
        let _words = cursor.double_prefixed_string();
    }
    let _music = cursor.double_prefixed_string();
    let _copyright = cursor.double_prefixed_string();
    let _tab_author = cursor.double_prefixed_string();
    let _instructions = cursor.double_prefixed_string();

    skip_notices(&mut cursor, settings.get_max_notice_count());

    let raw_tempo = generation.read_tempo(&mut cursor);
    trace!(
        "Offset `0x{offset:08x} ({offset})`: raw tempo {raw_tempo}",
        offset = cursor.pos()
    );

    TabMetadata {
        title,
        artist,
        album,
        tempo: clamp_tempo(i64::from(raw_tempo)),
        version: version_number(&version_string),
        ..TabMetadata::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn push_double_prefixed(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }

    fn push_len_prefixed(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn header(version: &str, generation: Generation, tempo: i32) -> Vec<u8> {
        let mut out = vec![version.len() as u8];
        let mut slot = version.as_bytes().to_vec();
        slot.resize(VERSION_SLOT_LEN, 0);
        out.extend_from_slice(&slot);

        push_double_prefixed(&mut out, "Title");
        push_double_prefixed(&mut out, "Subtitle");
        push_double_prefixed(&mut out, "Artist");
        push_double_prefixed(&mut out, "Album");
        if generation == Generation::Gp5 {
            push_double_prefixed(&mut out, "Words");
        }
        for field in ["Music", "Copyright", "Tab", "Instructions"] {
            push_double_prefixed(&mut out, field);
        }

        out.extend_from_slice(&2i32.to_le_bytes());
        push_double_prefixed(&mut out, "notice one");
        push_double_prefixed(&mut out, "notice two");

        if generation != Generation::Gp3 {
            out.extend_from_slice(&1i32.to_le_bytes());
            for line in 0..LYRICS_LINES {
                out.extend_from_slice(&(line as i32).to_le_bytes());
                push_len_prefixed(&mut out, "la la");
            }
        }
        if generation == Generation::Gp5 {
            for _ in 0..PAGE_SETUP_STRINGS {
                push_double_prefixed(&mut out, "%page%");
            }
            push_double_prefixed(&mut out, "Moderate");
        }

        out.extend_from_slice(&tempo.to_le_bytes());
        out
    }

    #[test]
    fn test_classifies_generation() {
        assert_eq!(
            Generation::from_version_string("FICHIER GUITAR PRO v5.10"),
            Generation::Gp5
        );
        assert_eq!(
            Generation::from_version_string("FICHIER GUITAR PRO v4.06"),
            Generation::Gp4
        );
        assert_eq!(
            Generation::from_version_string("FICHIER GUITAR PRO v3.00"),
            Generation::Gp3
        );
        assert_eq!(Generation::from_version_string(""), Generation::Gp3);
    }

    #[test]
    fn test_version_number() {
        assert_eq!(version_number("FICHIER GUITAR PRO v3.00"), "3.00");
        assert_eq!(version_number("CLIPBOARD GP 4.0"), "CLIPBOARD GP 4.0");
        assert_eq!(version_number("trailing v"), "trailing v");
    }

    #[test]
    fn test_decodes_every_generation() {
        let cases = [
            ("FICHIER GUITAR PRO v3.00", Generation::Gp3, "3.00", 95),
            ("FICHIER GUITAR PRO v4.06", Generation::Gp4, "4.06", 140),
            ("FICHIER GUITAR PRO v5.00", Generation::Gp5, "5.00", 200),
        ];

        for (version, generation, label, tempo) in cases {
            let data = header(version, generation, tempo);
            let metadata = decode_legacy_header(&data, &ParserSettings::default());
            assert_eq!(
                metadata,
                TabMetadata {
                    title: "Title".to_owned(),
                    artist: "Artist".to_owned(),
                    album: "Album".to_owned(),
                    tempo,
                    track_count: 0,
                    track_names: vec![],
                    version: label.to_owned(),
                },
                "{version}"
            );
        }
    }

    #[test]
    fn test_out_of_range_tempo_defaults() {
        for tempo in [0, -1, 1001, i32::MAX] {
            let data = header("FICHIER GUITAR PRO v5.00", Generation::Gp5, tempo);
            let metadata = decode_legacy_header(&data, &ParserSettings::default());
            assert_eq!(metadata.tempo, 120);
        }
    }

    #[test]
    fn test_truncated_body_keeps_header_fields() {
        let data = header("FICHIER GUITAR PRO v4.06", Generation::Gp4, 90);
        // Cut before the notices.
        let cut = data.len() / 2;
        let metadata = decode_legacy_header(&data[..cut], &ParserSettings::default());
        assert_eq!(metadata.title, "Title");
        assert_eq!(metadata.album, "Album");
        assert_eq!(metadata.tempo, 120);
    }

    #[test]
    fn test_notice_count_is_capped() {
        let mut data = header("FICHIER GUITAR PRO v3.00", Generation::Gp3, 100);
        // Overwrite the notice count (followed by two 15-byte notices and the tempo).
        let pos = data.len() - 4 - 15 * 2 - 4;
        data[pos..pos + 4].copy_from_slice(&i32::MAX.to_le_bytes());

        let settings = ParserSettings::default().max_notice_count(2);
        let metadata = decode_legacy_header(&data, &settings);
        assert_eq!(metadata.tempo, 100);
    }
}
