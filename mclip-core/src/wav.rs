//! WAV wrapping for finished PCM artifacts

use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs;
use std::path::Path;

/// Wrap a finished 16-bit LE PCM file in a WAV container.
pub fn wrap_pcm_as_wav(
    pcm_path: &Path,
    wav_path: &Path,
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let bytes = fs::read(pcm_path)?;
    let mut writer = WavWriter::create(wav_path, spec)
        .map_err(|e| Error::Wav(format!("failed to create {}: {e}", wav_path.display())))?;
    for sample in bytes.chunks_exact(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]);
        writer
            .write_sample(value)
            .map_err(|e| Error::Wav(format!("write failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Wav(format!("finalize failed: {e}")))?;
    Ok(())
}
