//! Shared fixtures for cache and transport tests.

#![allow(dead_code)]

use core_library::models::Track;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, Tag, TagExt, TagType};

pub fn track(id: &str) -> Track {
    let mut track = Track::new(
        id,
        "chan-1",
        "Late Night",
        format!("{}.wav", id),
        format!("https://cdn.example.com/{}", id),
    );
    track.title = Some(format!("Track {}", id));
    track
}

/// Half a second of 8 kHz mono silence.
pub fn short_wav() -> Vec<u8> {
    let sample_rate: u32 = 8_000;
    let data_len: u32 = sample_rate;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

/// [`short_wav`] with an ID3v2 tag holding a PNG front cover.
pub fn wav_with_cover() -> Vec<u8> {
    let mut tag = Tag::new(TagType::Id3v2);
    tag.set_title("Harbor Lights".to_string());
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Png),
        None,
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    ));

    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), short_wav()).unwrap();
    tag.save_to_path(file.path(), WriteOptions::default())
        .unwrap();
    std::fs::read(file.path()).unwrap()
}
