use serde::Serialize;

/// Tempo used whenever a file carries no usable tempo.
pub const DEFAULT_TEMPO: i32 = 120;
/// Lowest tempo accepted as valid.
pub const MIN_TEMPO: i32 = 1;
/// Highest tempo accepted as valid.
pub const MAX_TEMPO: i32 = 1000;

/// The metadata extracted from a tablature file.
///
/// Text fields are empty rather than absent. `track_count` always equals `track_names.len()`;
/// both stay empty for the fixed-layout generations, whose track list is not decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub tempo: i32,
    pub track_count: usize,
    pub track_names: Vec<String>,
    /// Coarse, diagnostic-only format tag (`"5.00"`, `"GPX"`, `"GP7+"`).
    pub version: String,
}

impl Default for TabMetadata {
    fn default() -> Self {
        TabMetadata {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            tempo: DEFAULT_TEMPO,
            track_count: 0,
            track_names: Vec::new(),
            version: String::new(),
        }
    }
}

impl TabMetadata {
    /// The record returned when parsing cannot proceed, tagged with the path that failed.
    pub fn sentinel(version: impl Into<String>) -> Self {
        TabMetadata {
            version: version.into(),
            ..TabMetadata::default()
        }
    }

    /// `true` if nothing beyond `version` was extracted.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.artist.is_empty()
            && self.album.is_empty()
            && self.tempo == DEFAULT_TEMPO
            && self.track_names.is_empty()
    }

    pub(crate) fn with_track_names(mut self, track_names: Vec<String>) -> Self {
        self.track_count = track_names.len();
        self.track_names = track_names;
        self
    }
}

/// Keep `tempo` if it lies in `[MIN_TEMPO, MAX_TEMPO]`, otherwise use [`DEFAULT_TEMPO`].
pub fn clamp_tempo(tempo: i64) -> i32 {
    match i32::try_from(tempo) {
        Ok(t) if (MIN_TEMPO..=MAX_TEMPO).contains(&t) => t,
        _ => DEFAULT_TEMPO,
    }
}
