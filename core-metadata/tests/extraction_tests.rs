//! Integration tests for metadata extraction
//!
//! Fixtures are synthesized PCM WAV files tagged through lofty, so no binary
//! assets are checked in.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use core_metadata::extractor::MetadataExtractor;
use core_metadata::{MetadataError, PartOf};

#[test]
fn test_extracts_technical_fields_from_untagged_wav() {
    let extractor = MetadataExtractor::new();
    let wav = common::silent_wav(2);

    let metadata = extractor.extract_from_payload(&wav, None).unwrap();

    assert_eq!(metadata.format.as_deref(), Some("WAVE"));
    assert_eq!(metadata.codec.as_deref(), Some("PCM"));
    assert_eq!(metadata.sample_rate, Some(common::SAMPLE_RATE));
    assert_eq!(metadata.channels, Some(2));
    assert_eq!(metadata.bits_per_sample, Some(16));
    assert_eq!(metadata.bitrate, Some(1411));
    assert!((metadata.duration.unwrap() - 2.0).abs() < 0.01);
    assert_eq!(metadata.file_size, Some(wav.len() as u64));
    assert_eq!(metadata.title, None);
    assert!(metadata.genre.is_empty());
    assert!(metadata.cover_art.is_none());
}

#[test]
fn test_extracts_tags_and_cover_art() {
    let extractor = MetadataExtractor::new();
    let wav = common::tagged_wav();

    let metadata = extractor.extract_from_payload(&wav, Some("audio/wav")).unwrap();

    assert_eq!(metadata.title.as_deref(), Some("Night Drive"));
    assert_eq!(metadata.artist.as_deref(), Some("The Examples"));
    assert_eq!(metadata.album.as_deref(), Some("Open Roads"));
    assert_eq!(metadata.genre, vec!["Synthwave".to_string()]);
    assert_eq!(
        metadata.track,
        Some(PartOf {
            no: Some(3),
            of: Some(12)
        })
    );

    let expected = format!("data:image/png;base64,{}", STANDARD.encode(common::COVER_PNG));
    assert_eq!(metadata.cover_art, Some(expected));
}

#[test]
fn test_extract_cover_art_only() {
    let extractor = MetadataExtractor::new();

    let cover = extractor
        .extract_cover_art(&common::tagged_wav(), None)
        .unwrap();
    assert!(cover.unwrap().starts_with("data:image/png;base64,"));

    let none = extractor
        .extract_cover_art(&common::silent_wav(1), None)
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_prefix_with_known_total_reports_total_size() {
    let extractor = MetadataExtractor::new();
    let wav = common::silent_wav(1);

    let metadata = extractor
        .extract_from_prefix(&wav, Some(wav.len() as u64), None)
        .unwrap();

    assert_eq!(metadata.file_size, Some(wav.len() as u64));
    assert!((metadata.duration.unwrap() - 1.0).abs() < 0.01);
}

#[test]
fn test_garbage_is_rejected() {
    let extractor = MetadataExtractor::new();

    let result = extractor.extract_from_payload(b"This is not a valid audio file", None);

    assert!(matches!(result, Err(MetadataError::UnsupportedFormat(_))));
}

/// MPEG-1 Layer III frames (128 kbps, 44.1 kHz) behind a run of zero bytes,
/// so content sniffing finds no container signature at the start.
fn mpeg_frames_after_junk() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = vec![0u8; 64];
    for _ in 0..40 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        data.extend_from_slice(&frame);
    }
    data
}

#[test]
fn test_unsniffable_payload_without_hint_is_unsupported() {
    let extractor = MetadataExtractor::new();

    let result = extractor.extract_from_payload(&mpeg_frames_after_junk(), None);

    assert!(matches!(result, Err(MetadataError::UnsupportedFormat(_))));
}

#[test]
fn test_mime_hint_selects_container_when_sniffing_fails() {
    let extractor = MetadataExtractor::new();
    let payload = mpeg_frames_after_junk();

    match extractor.extract_from_payload(&payload, Some("audio/mpeg")) {
        Ok(metadata) => {
            assert_eq!(metadata.sample_rate, Some(44_100));
            assert_eq!(metadata.file_size, Some(payload.len() as u64));
        }
        Err(e) => assert!(
            matches!(e, MetadataError::ExtractionFailed(_)),
            "hinted container should be parsed, got {:?}",
            e
        ),
    }
}
