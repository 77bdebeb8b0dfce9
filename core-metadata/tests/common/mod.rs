//! Synthesized audio fixtures.

use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, Tag, TagExt, TagType};

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;

/// A few bytes that start like a PNG; lofty only needs the MIME type.
pub const COVER_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// Silent 16-bit stereo PCM WAV of the given length.
pub fn silent_wav(seconds: u32) -> Vec<u8> {
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let data_len = byte_rate * seconds;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

/// One-second WAV carrying an ID3v2 tag with text fields and a front cover.
pub fn tagged_wav() -> Vec<u8> {
    let mut tag = Tag::new(TagType::Id3v2);
    tag.set_title("Night Drive".to_string());
    tag.set_artist("The Examples".to_string());
    tag.set_album("Open Roads".to_string());
    tag.set_genre("Synthwave".to_string());
    tag.set_track(3);
    tag.set_track_total(12);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Png),
        None,
        COVER_PNG.to_vec(),
    ));

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), silent_wav(1)).unwrap();
    tag.save_to_path(file.path(), WriteOptions::default())
        .unwrap();
    std::fs::read(file.path()).unwrap()
}
