//! Track descriptors and audio track selection

use crate::error::{Error, Result};

/// Media type prefix identifying audio tracks
pub const AUDIO_MIME_PREFIX: &str = "audio";

/// Descriptor for one track in a source container.
///
/// Produced once from container metadata at setup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Position of the track in the container's track list
    pub index: usize,

    /// Declared media type, e.g. `audio/flac` or `application/octet-stream`
    pub mime: String,

    /// Channel count (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Declared bit rate in bits per second, when the container carries one
    pub bit_rate: Option<u32>,
}

/// Return the index of the first track whose media type is audio.
///
/// Single deterministic pass over the track list; `NoAudioTrack` when the
/// container has no audio at all.
pub fn first_audio_track(tracks: &[TrackInfo]) -> Result<usize> {
    tracks
        .iter()
        .find(|t| t.mime.starts_with(AUDIO_MIME_PREFIX))
        .map(|t| t.index)
        .ok_or(Error::NoAudioTrack)
}
