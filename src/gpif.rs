//! Metadata extraction from GPIF documents.
//!
//! The document may be a fragment (just the `<Score>` element), unterminated, or carry markup the
//! reader rejects halfway through. Extraction is therefore a single lenient pass over the event
//! stream: whatever has been collected when the stream ends or errors is returned.

use crate::metadata::{DEFAULT_TEMPO, TabMetadata, clamp_tempo};

use log::{debug, trace};
use quick_xml::events::{BytesCData, BytesText, Event};
use quick_xml::reader::Reader;

/// Text collected from a single element.
#[derive(Debug, Default)]
struct ElementText {
    text: String,
    cdata: Option<String>,
    /// A child element or mixed content rules out the plain-text form.
    nested: bool,
}

impl ElementText {
    fn push_text(&mut self, e: &BytesText<'_>) {
        let text = match e.unescape() {
            Ok(text) => text.into_owned(),
            Err(_) => String::from_utf8_lossy(e).into_owned(),
        };
        self.text.push_str(&text);
    }

    fn push_cdata(&mut self, e: BytesCData<'_>) {
        let inner = String::from_utf8_lossy(&e.into_inner()).into_owned();
        match self.cdata {
            Some(_) => self.nested = true,
            None => self.cdata = Some(inner),
        }
    }

    fn cdata(&self) -> Option<String> {
        self.cdata.as_deref().map(|s| s.trim().to_owned())
    }

    fn plain(&self) -> Option<String> {
        (!self.nested && self.cdata.is_none()).then(|| self.text.trim().to_owned())
    }
}

/// First-seen values of a tag, in both of its forms.
#[derive(Debug, Default)]
struct TagValue {
    cdata: Option<String>,
    plain: Option<String>,
}

impl TagValue {
    fn offer(&mut self, element: &ElementText) {
        if self.cdata.is_none() {
            self.cdata = element.cdata();
        }
        if self.plain.is_none() {
            self.plain = element.plain();
        }
    }

    /// The CDATA form wins over the plain form.
    fn into_value(self) -> String {
        self.cdata.or(self.plain).unwrap_or_default()
    }
}

/// Elements whose content is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Artist,
    Album,
    AutomationType,
    AutomationValue,
    TrackName,
}

#[derive(Debug, Default)]
struct Extractor {
    title: TagValue,
    artist: TagValue,
    album: TagValue,
    tempo_armed: bool,
    tempo: Option<f64>,
    in_track: bool,
    track_name_seen: bool,
    track_names: Vec<String>,
    /// The field being captured and the depth its element opened at.
    capture: Option<(Field, usize, ElementText)>,
    depth: usize,
}

impl Extractor {
    fn field_for(&self, name: &[u8]) -> Option<Field> {
        match name {
            b"Title" => Some(Field::Title),
            b"Artist" => Some(Field::Artist),
            b"Album" => Some(Field::Album),
            b"Type" => Some(Field::AutomationType),
            b"Value" if self.tempo_armed && self.tempo.is_none() => Some(Field::AutomationValue),
            b"Name" if self.in_track && !self.track_name_seen => Some(Field::TrackName),
            _ => None,
        }
    }

    fn start(&mut self, name: &[u8]) {
        self.depth += 1;

        if let Some((_, _, element)) = self.capture.as_mut() {
            element.nested = true;
            return;
        }

        if name == b"Track" {
            self.in_track = true;
            self.track_name_seen = false;
        }

        if let Some(field) = self.field_for(name) {
            self.capture = Some((field, self.depth, ElementText::default()));
        }
    }

    /// Self-closing elements carry no value, but still count as child markup.
    fn empty(&mut self) {
        if let Some((_, _, element)) = self.capture.as_mut() {
            element.nested = true;
        }
    }

    fn end(&mut self, name: &[u8]) {
        if matches!(self.capture, Some((_, depth, _)) if depth == self.depth) {
            if let Some((field, _, element)) = self.capture.take() {
                self.finish(field, &element);
            }
        }

        if name == b"Track" {
            self.in_track = false;
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(&mut self, field: Field, element: &ElementText) {
        match field {
            Field::Title => self.title.offer(element),
            Field::Artist => self.artist.offer(element),
            Field::Album => self.album.offer(element),
            Field::AutomationType => {
                let kind = element.cdata().or_else(|| element.plain());
                if kind.as_deref() == Some("Tempo") {
                    self.tempo_armed = true;
                }
            }
            Field::AutomationValue => {
                let text = element.cdata().or_else(|| element.plain());
                if let Some(value) = text.as_deref().and_then(leading_number) {
                    trace!("tempo automation value {value}");
                    self.tempo = Some(value);
                }
            }
            Field::TrackName => {
                self.track_name_seen = true;
                if let Some(name) = element.cdata().or_else(|| element.plain()) {
                    if !name.is_empty() {
                        self.track_names.push(name);
                    }
                }
            }
        }
    }

    fn into_metadata(self) -> TabMetadata {
        let tempo = self
            .tempo
            .map_or(DEFAULT_TEMPO, |t| clamp_tempo(t.round() as i64));

        TabMetadata {
            title: self.title.into_value(),
            artist: self.artist.into_value(),
            album: self.album.into_value(),
            tempo,
            ..TabMetadata::default()
        }
        .with_track_names(self.track_names)
    }
}

/// Parse the leading number of an automation value such as `"120 2"`.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

/// Extract title, artist, album, tempo and track names from a GPIF document.
///
/// The `version` of the returned record is left empty for the caller to tag.
pub fn extract_metadata(xml: &str) -> TabMetadata {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut extractor = Extractor::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => extractor.start(e.local_name().as_ref()),
            Ok(Event::End(e)) => extractor.end(e.local_name().as_ref()),
            Ok(Event::Empty(_)) => extractor.empty(),
            Ok(Event::Text(e)) => {
                if let Some((_, _, element)) = extractor.capture.as_mut() {
                    element.push_text(&e);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, _, element)) = extractor.capture.as_mut() {
                    element.push_cdata(e);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(
                    "stopping GPIF extraction at offset {}: {e}",
                    reader.buffer_position()
                );
                break;
            }
        }
    }

    extractor.into_metadata()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<GPIF>
  <GPVersion>7</GPVersion>
  <Score>
    <Title><![CDATA[ Black & White ]]></Title>
    <SubTitle><![CDATA[]]></SubTitle>
    <Artist>The Band</Artist>
    <Album><![CDATA[First]]></Album>
  </Score>
  <MasterTrack>
    <Automations>
      <Automation>
        <Type>Tempo</Type>
        <Linear>false</Linear>
        <Bar>0</Bar>
        <Value>96.6 2</Value>
      </Automation>
      <Automation>
        <Type>Tempo</Type>
        <Value>180 2</Value>
      </Automation>
    </Automations>
  </MasterTrack>
  <Tracks>
    <Track id="0">
      <Name><![CDATA[Lead Guitar]]></Name>
      <ShortName><![CDATA[l.guit.]]></ShortName>
      <Staves><Staff><Properties><Property name="Tuning"><Name>ignored</Name></Property></Properties></Staff></Staves>
    </Track>
    <Track id="1">
      <Name>Bass</Name>
    </Track>
    <Track id="2">
      <Name><![CDATA[]]></Name>
    </Track>
  </Tracks>
</GPIF>"#;

    #[test]
    fn test_extracts_full_document() {
        let metadata = extract_metadata(DOCUMENT);
        assert_eq!(
            metadata,
            TabMetadata {
                title: "Black & White".to_owned(),
                artist: "The Band".to_owned(),
                album: "First".to_owned(),
                tempo: 97,
                track_count: 2,
                track_names: vec!["Lead Guitar".to_owned(), "Bass".to_owned()],
                version: String::new(),
            }
        );
    }

    #[test]
    fn test_score_fragment_without_tempo() {
        let metadata = extract_metadata(
            "<Score><Title>Song A</Title><Artist>Band B</Artist></Score>",
        );
        assert_eq!(metadata.title, "Song A");
        assert_eq!(metadata.artist, "Band B");
        assert_eq!(metadata.album, "");
        assert_eq!(metadata.tempo, 120);
        assert_eq!(metadata.track_count, 0);
    }

    #[test]
    fn test_cdata_is_preferred_over_plain() {
        let metadata = extract_metadata(
            "<GPIF><Title>plain</Title><Title><![CDATA[wrapped]]></Title></GPIF>",
        );
        assert_eq!(metadata.title, "wrapped");
    }

    #[test]
    fn test_nested_markup_is_not_plain_text() {
        let metadata = extract_metadata("<GPIF><Album><b>bold</b></Album></GPIF>");
        assert_eq!(metadata.album, "");
    }

    #[test]
    fn test_out_of_range_tempo_defaults() {
        let metadata = extract_metadata(
            "<GPIF><Automation><Type>Tempo</Type><Value>2500 2</Value></Automation></GPIF>",
        );
        assert_eq!(metadata.tempo, 120);
    }

    #[test]
    fn test_value_before_tempo_type_is_ignored() {
        let metadata = extract_metadata(
            "<GPIF><Value>300</Value><Automation><Type>Tempo</Type><Value>n/a</Value><Value>75</Value></Automation></GPIF>",
        );
        assert_eq!(metadata.tempo, 75);
    }

    #[test]
    fn test_unterminated_document_keeps_collected_fields() {
        let metadata = extract_metadata(
            "<GPIF><Score><Title>Cut</Title></Score><Tracks><Track><Name>Keys</Name>",
        );
        assert_eq!(metadata.title, "Cut");
        assert_eq!(metadata.track_names, vec!["Keys".to_owned()]);
        assert_eq!(metadata.track_count, 1);
    }

    #[test]
    fn test_self_closing_tag_does_not_shadow_later_value() {
        let metadata =
            extract_metadata("<GPIF><Title/><Score><Title>Real</Title><Album/></Score></GPIF>");
        assert_eq!(metadata.title, "Real");
        assert_eq!(metadata.album, "");
    }

    #[test]
    fn test_tempo_type_in_cdata() {
        let metadata = extract_metadata(
            "<GPIF><Automation><Type><![CDATA[Tempo]]></Type><Value>90</Value></Automation></GPIF>",
        );
        assert_eq!(metadata.tempo, 90);
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("120 2"), Some(120.0));
        assert_eq!(leading_number(" 96.5"), Some(96.5));
        assert_eq!(leading_number("fast"), None);
        assert_eq!(leading_number(""), None);
    }
}
