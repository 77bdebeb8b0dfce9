//! Structured metadata recovered from an audio payload.

use serde::{Deserialize, Serialize};

/// "n of m" position, as used for track and disc numbers.
///
/// Either side may be missing: a tag can carry a track number without a
/// total, or a total without a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartOf {
    pub no: Option<u32>,
    pub of: Option<u32>,
}

impl PartOf {
    pub fn new(no: Option<u32>, of: Option<u32>) -> Option<Self> {
        if no.is_none() && of.is_none() {
            None
        } else {
            Some(Self { no, of })
        }
    }
}

/// Technical and descriptive fields of one track.
///
/// Every field is optional: an absent bitrate means "unknown", never zero.
/// Instances live only in the in-process memo of
/// [`MetadataService`](crate::service::MetadataService) and are never
/// written to the blob store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    // Technical
    /// Container name, e.g. "MPEG", "FLAC", "WAVE".
    pub format: Option<String>,
    /// Codec name, e.g. "MPEG 1 Layer 3", "PCM".
    pub codec: Option<String>,
    /// Audio bitrate in kbps.
    pub bitrate: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bits_per_sample: Option<u8>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Size of the whole resource in bytes, when known.
    pub file_size: Option<u64>,

    // Tags
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Vec<String>,
    pub track: Option<PartOf>,
    pub disk: Option<PartOf>,
    pub comment: Vec<String>,

    /// First embedded picture as a `data:<mime>;base64,...` URI.
    pub cover_art: Option<String>,
}

impl AudioMetadata {
    pub fn has_cover_art(&self) -> bool {
        self.cover_art.is_some()
    }
}

/// Presentation label for a channel count.
pub fn channel_layout_label(channels: u8) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        n => format!("{} channels", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_layout_label() {
        assert_eq!(channel_layout_label(1), "Mono");
        assert_eq!(channel_layout_label(2), "Stereo");
        assert_eq!(channel_layout_label(6), "6 channels");
    }

    #[test]
    fn test_part_of_requires_one_side() {
        assert_eq!(PartOf::new(None, None), None);
        assert_eq!(
            PartOf::new(Some(3), None),
            Some(PartOf {
                no: Some(3),
                of: None
            })
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let metadata = AudioMetadata {
            sample_rate: Some(44_100),
            bits_per_sample: Some(16),
            cover_art: Some("data:image/png;base64,AA".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["sampleRate"], 44_100);
        assert_eq!(json["bitsPerSample"], 16);
        assert!(json["bitrate"].is_null());
        assert!(metadata.has_cover_art());
    }
}
