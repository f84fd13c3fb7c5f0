//! Error types for mclip-core
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the extraction pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Source container has no track with an audio media type
    #[error("no audio track found in source")]
    NoAudioTrack,

    /// Audio track has a channel layout outside mono/stereo
    #[error("unsupported channel layout: {channels} channels (only mono and stereo are supported)")]
    UnsupportedChannelLayout { channels: u16 },

    /// Source sample rate does not match the pinned rate
    #[error("unsupported sample rate: {rate} Hz (pipeline is pinned to {required} Hz)")]
    UnsupportedSampleRate { rate: u32, required: u32 },

    /// Invalid clip range parameters
    #[error("invalid clip range: {0}")]
    InvalidRange(String),

    /// Output file open/write/close errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoder creation or configuration failed
    #[error("codec configuration error: {0}")]
    CodecConfiguration(String),

    /// Container probing or sample reading errors
    #[error("demux error: {0}")]
    Demux(String),

    /// Decoder run-time errors
    #[error("decode error: {0}")]
    Decode(String),

    /// Whole-file resampling errors
    #[error("resample error: {0}")]
    Resample(String),

    /// WAV wrapping errors
    #[error("WAV error: {0}")]
    Wav(String),

    /// Extraction was cancelled by the caller
    #[error("extraction cancelled")]
    Cancelled,
}

/// Convenience Result type using the mclip-core Error
pub type Result<T> = std::result::Result<T, Error>;
