//! Whole-file PCM resampling using rubato
//!
//! Converts a finished 16-bit LE PCM file from the source rate to the target
//! rate in one synchronous call, mirroring the whole-file contract of the
//! extraction pipeline: the input file is complete and released before the
//! resampler runs.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Outcome of one whole-file resample invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleReport {
    /// Frames read from the input file
    pub input_frames: usize,
    /// Frames written to the output file
    pub output_frames: usize,
    /// Input sample rate in Hz
    pub src_rate: u32,
    /// Output sample rate in Hz
    pub dst_rate: u32,
}

/// Resample a 16-bit LE PCM file from `src_rate` to `dst_rate`.
///
/// Equal rates degenerate to a file copy. The whole input is processed as a
/// single chunk; this is a file-bound post-processing step, not a streaming
/// resampler.
pub fn resample_pcm_file(
    input: &Path,
    output: &Path,
    src_rate: u32,
    dst_rate: u32,
    channels: u16,
) -> Result<ResampleReport> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(Error::Resample(format!(
            "invalid rates: {src_rate} Hz -> {dst_rate} Hz"
        )));
    }
    if channels == 0 {
        return Err(Error::Resample("channel count must be nonzero".into()));
    }

    let bytes = fs::read(input)?;
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    let input_frames = samples.len() / channels as usize;

    if src_rate == dst_rate {
        debug!("rates match at {src_rate} Hz, copying instead of resampling");
        fs::copy(input, output)?;
        return Ok(ResampleReport {
            input_frames,
            output_frames: input_frames,
            src_rate,
            dst_rate,
        });
    }

    if input_frames == 0 {
        fs::write(output, [])?;
        return Ok(ResampleReport {
            input_frames: 0,
            output_frames: 0,
            src_rate,
            dst_rate,
        });
    }

    let planar_input = deinterleave(&samples, channels);

    let mut resampler = FastFixedIn::<f32>::new(
        dst_rate as f64 / src_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Resample(format!("failed to create resampler: {e}")))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Resample(format!("resampling failed: {e}")))?;

    let output_frames = planar_output.first().map(|c| c.len()).unwrap_or(0);
    let interleaved = interleave(&planar_output);

    let mut out_bytes = Vec::with_capacity(interleaved.len() * 2);
    for sample in interleaved {
        let quantized = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        out_bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    fs::write(output, &out_bytes)?;

    debug!("resampled {input_frames} frames at {src_rate} Hz to {output_frames} frames at {dst_rate} Hz");

    Ok(ResampleReport {
        input_frames,
        output_frames,
        src_rate,
        dst_rate,
    })
}

/// Convert interleaved 16-bit samples to planar normalized f32.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[i16], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            let sample = samples[frame_idx * num_channels + ch_idx];
            planar[ch_idx].push(sample as f32 / 32768.0);
        }
    }
    planar
}

/// Convert planar f32 samples back to interleaved order.
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);
    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            interleaved.push(planar[ch_idx][frame_idx]);
        }
    }
    interleaved
}
