//! Audio Tag Extraction
//!
//! Recovers technical parameters, descriptive tags and the first embedded
//! picture from an in-memory audio payload using the `lofty` crate.
//!
//! ## Overview
//!
//! - Works on complete payloads and on leading fragments of a file
//! - Container detection sniffs the bytes first and falls back to a MIME hint
//! - Bitrate is reported in kbps, duration in seconds
//! - Cover art is returned as a base64 `data:` URI carrying the picture's MIME type
//! - For a leading fragment with a known total size, duration is inferred
//!   from the total size and the bitrate
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::extractor::MetadataExtractor;
//!
//! let extractor = MetadataExtractor::new();
//! let metadata = extractor.extract_from_payload(&payload, Some("audio/mpeg"))?;
//! println!("{} kbps", metadata.bitrate.unwrap_or_default());
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::io::Cursor;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::metadata::{AudioMetadata, PartOf};

/// Stateless tag reader over byte buffers.
///
/// Parsing is CPU-bound and synchronous; async callers holding a large
/// payload should run it on a blocking thread.
#[derive(Debug, Clone, Copy)]
pub struct MetadataExtractor {
    parse_options: ParseOptions,
}

impl MetadataExtractor {
    /// Create an extractor that tolerates malformed tags where possible.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new().parsing_mode(ParsingMode::BestAttempt),
        }
    }

    /// Create extractor with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Extract metadata from a complete payload.
    ///
    /// `file_size` in the result is the payload length.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::UnsupportedFormat`] when neither the bytes nor the
    ///   hint identify a supported container
    /// - [`MetadataError::ExtractionFailed`] when the container cannot be parsed
    pub fn extract_from_payload(
        &self,
        payload: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<AudioMetadata> {
        let tagged_file = self.read(payload, mime_hint)?;
        let mut metadata = Self::build(&tagged_file);
        metadata.file_size = Some(payload.len() as u64);
        Ok(metadata)
    }

    /// Extract metadata from the leading bytes of a larger resource.
    ///
    /// When `total_size` is known and exceeds the fragment, missing duration
    /// or bitrate is inferred from it.
    pub fn extract_from_prefix(
        &self,
        prefix: &[u8],
        total_size: Option<u64>,
        mime_hint: Option<&str>,
    ) -> Result<AudioMetadata> {
        let tagged_file = self.read(prefix, mime_hint)?;
        let mut metadata = Self::build(&tagged_file);
        metadata.file_size = total_size;

        if let Some(total) = total_size {
            let truncated = total > prefix.len() as u64;
            let (duration, bitrate) =
                infer_from_total_size(metadata.duration, metadata.bitrate, total, truncated);
            metadata.duration = duration;
            metadata.bitrate = bitrate;
        }

        Ok(metadata)
    }

    /// Only the first embedded picture of `payload`, as a data URI.
    pub fn extract_cover_art(
        &self,
        payload: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<Option<String>> {
        let tagged_file = self.read(payload, mime_hint)?;
        Ok(first_picture(tagged_file.tags()))
    }

    fn read(&self, data: &[u8], mime_hint: Option<&str>) -> Result<TaggedFile> {
        if data.is_empty() {
            return Err(MetadataError::ExtractionFailed("Empty payload".to_string()));
        }

        let mut probe = Probe::new(Cursor::new(data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe data: {}", e)))?;

        if probe.file_type().is_none() {
            match mime_hint.and_then(file_type_from_mime) {
                Some(file_type) => {
                    debug!(?file_type, "Content sniffing failed, using MIME hint");
                    probe = probe.set_file_type(file_type);
                }
                None => {
                    return Err(MetadataError::UnsupportedFormat(
                        mime_hint.unwrap_or("unknown").to_string(),
                    ))
                }
            }
        }

        probe
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse data: {}", e)))
    }

    fn build(tagged_file: &TaggedFile) -> AudioMetadata {
        let properties = tagged_file.properties();
        let (format, codec) = describe_file_type(tagged_file.file_type());

        let duration = properties.duration();
        let bitrate = properties
            .audio_bitrate()
            .or_else(|| properties.overall_bitrate())
            .filter(|kbps| *kbps > 0);

        let mut metadata = AudioMetadata {
            format: Some(format),
            codec,
            bitrate,
            sample_rate: properties.sample_rate().filter(|rate| *rate > 0),
            channels: properties.channels().filter(|n| *n > 0),
            bits_per_sample: properties.bit_depth().filter(|bits| *bits > 0),
            duration: (!duration.is_zero()).then(|| duration.as_secs_f64()),
            cover_art: first_picture(tagged_file.tags()),
            ..Default::default()
        };

        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => apply_tag(&mut metadata, tag),
            None => debug!("No tags found in payload"),
        }

        metadata
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_tag(metadata: &mut AudioMetadata, tag: &Tag) {
    metadata.title = tag.title().and_then(|s| normalize_text(&s));
    metadata.artist = tag.artist().and_then(|s| normalize_text(&s));
    metadata.album = tag.album().and_then(|s| normalize_text(&s));
    metadata.year = tag.year().filter(|year| *year > 0);
    metadata.genre = tag
        .get_strings(&ItemKey::Genre)
        .filter_map(normalize_text)
        .collect();
    metadata.comment = tag
        .get_strings(&ItemKey::Comment)
        .filter_map(normalize_text)
        .collect();
    metadata.track = PartOf::new(tag.track(), tag.track_total());
    metadata.disk = PartOf::new(tag.disk(), tag.disk_total());
}

/// First picture across all tag blocks, encoded as a data URI.
fn first_picture(tags: &[Tag]) -> Option<String> {
    tags.iter()
        .flat_map(|tag| tag.pictures())
        .find(|picture| !picture.data().is_empty())
        .map(|picture| {
            let mime = picture
                .mime_type()
                .map(|mime| mime.as_str())
                .unwrap_or("application/octet-stream");
            format!("data:{};base64,{}", mime, STANDARD.encode(picture.data()))
        })
}

/// Trim and collapse whitespace; drop control characters and empty values.
fn normalize_text(text: &str) -> Option<String> {
    let normalized: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    (!normalized.is_empty()).then_some(normalized)
}

/// Fill in duration or bitrate from the size of the whole resource.
///
/// For a truncated buffer the parsed duration only reflects the fragment,
/// so a known bitrate takes precedence.
fn infer_from_total_size(
    duration: Option<f64>,
    bitrate_kbps: Option<u32>,
    total_size: u64,
    truncated: bool,
) -> (Option<f64>, Option<u32>) {
    let total_bits = total_size as f64 * 8.0;

    match (duration, bitrate_kbps) {
        (_, Some(kbps)) if truncated || duration.is_none() => {
            (Some(total_bits / (kbps as f64 * 1000.0)), Some(kbps))
        }
        (Some(secs), None) if secs > 0.0 => {
            let kbps = (total_bits / secs / 1000.0).round() as u32;
            (Some(secs), (kbps > 0).then_some(kbps))
        }
        other => other,
    }
}

/// Container and codec names for presentation.
fn describe_file_type(file_type: FileType) -> (String, Option<String>) {
    let (format, codec) = match file_type {
        FileType::Aac => ("AAC", Some("AAC")),
        FileType::Aiff => ("AIFF", Some("PCM")),
        FileType::Ape => ("APE", Some("Monkey's Audio")),
        FileType::Flac => ("FLAC", Some("FLAC")),
        FileType::Mpeg => ("MPEG", Some("MPEG Audio")),
        FileType::Mp4 => ("MPEG-4", None),
        FileType::Mpc => ("Musepack", Some("Musepack")),
        FileType::Opus => ("Ogg", Some("Opus")),
        FileType::Vorbis => ("Ogg", Some("Vorbis")),
        FileType::Speex => ("Ogg", Some("Speex")),
        FileType::Wav => ("WAVE", Some("PCM")),
        FileType::WavPack => ("WavPack", Some("WavPack")),
        FileType::Custom(name) => (name, None),
        _ => ("Unknown", None),
    };
    (format.to_string(), codec.map(str::to_string))
}

/// Map a MIME type (parameters ignored) to a container.
fn file_type_from_mime(mime: &str) -> Option<FileType> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    let file_type = match essence.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg" => FileType::Mpeg,
        "audio/flac" | "audio/x-flac" => FileType::Flac,
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "video/mp4" => FileType::Mp4,
        "audio/aac" | "audio/aacp" | "audio/x-aac" => FileType::Aac,
        "audio/ogg" | "audio/vorbis" | "application/ogg" => FileType::Vorbis,
        "audio/opus" => FileType::Opus,
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => FileType::Wav,
        "audio/aiff" | "audio/x-aiff" => FileType::Aiff,
        "audio/wavpack" | "audio/x-wavpack" => FileType::WavPack,
        "audio/ape" | "audio/x-ape" => FileType::Ape,
        _ => return None,
    };
    Some(file_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  Hello   World  ").as_deref(),
            Some("Hello World")
        );
        assert_eq!(
            normalize_text("Title\nWith\tWhitespace").as_deref(),
            Some("Title With Whitespace")
        );
        assert_eq!(normalize_text("   "), None);
    }

    #[test]
    fn test_file_type_from_mime() {
        assert_eq!(file_type_from_mime("audio/mpeg"), Some(FileType::Mpeg));
        assert_eq!(file_type_from_mime("Audio/FLAC"), Some(FileType::Flac));
        assert_eq!(
            file_type_from_mime("audio/ogg; codecs=vorbis"),
            Some(FileType::Vorbis)
        );
        assert_eq!(file_type_from_mime("text/plain"), None);
    }

    #[test]
    fn test_describe_file_type() {
        assert_eq!(
            describe_file_type(FileType::Flac),
            ("FLAC".to_string(), Some("FLAC".to_string()))
        );
        assert_eq!(describe_file_type(FileType::Opus).0, "Ogg");
        assert_eq!(describe_file_type(FileType::Mp4).1, None);
    }

    #[test]
    fn test_infers_duration_for_truncated_buffer() {
        // 4 MB at 320 kbps
        let (duration, bitrate) = infer_from_total_size(Some(6.5), Some(320), 4_000_000, true);
        assert_eq!(bitrate, Some(320));
        assert!((duration.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_keeps_parsed_duration_for_complete_buffer() {
        let (duration, bitrate) = infer_from_total_size(Some(42.0), Some(128), 1_000, false);
        assert_eq!(duration, Some(42.0));
        assert_eq!(bitrate, Some(128));
    }

    #[test]
    fn test_infers_bitrate_from_duration() {
        let (duration, bitrate) = infer_from_total_size(Some(200.0), None, 8_000_000, true);
        assert_eq!(duration, Some(200.0));
        assert_eq!(bitrate, Some(320));
    }

    #[test]
    fn test_nothing_to_infer_from() {
        assert_eq!(
            infer_from_total_size(None, None, 1_000, true),
            (None, None)
        );
    }

    #[test]
    fn test_rejects_empty_and_unknown_payloads() {
        let extractor = MetadataExtractor::new();
        assert!(matches!(
            extractor.extract_from_payload(&[], None),
            Err(MetadataError::ExtractionFailed(_))
        ));
        assert!(matches!(
            extractor.extract_from_payload(b"This is not a valid audio file", None),
            Err(MetadataError::UnsupportedFormat(_))
        ));
    }
}
