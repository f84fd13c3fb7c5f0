//! Time-range audio extraction pipeline
//!
//! [`AudioClipper`] coordinates the demultiplexer and the decoder: it seeks
//! the source to the nearest sync point at or before the range start, then
//! alternates a bounded-wait *extract* step (pull one compressed sample,
//! feed the decoder) with a bounded-wait *decode* step (drain one PCM
//! buffer, transform, persist) until both queues report end-of-stream. The
//! two stages advance at different rates; neither wait is ever unbounded, so
//! the loop can always drain whichever queue has room.

use crate::decoder::{PcmDecoder, SymphoniaPcmDecoder, CODEC_TIMEOUT};
use crate::demux::SymphoniaSource;
use crate::error::{Error, Result};
use crate::pcm;
use crate::range::ClipRange;
use crate::resample::{resample_pcm_file, ResampleReport};
use crate::sink::PcmSink;
use crate::source::MediaSource;
use crate::track::{first_audio_track, TrackInfo};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline configuration.
///
/// The historical extractor variants (downmix, resample, neither) collapse
/// into these switches.
#[derive(Debug, Clone, Default)]
pub struct ClipOptions {
    /// Average stereo sample pairs down to mono
    pub downmix_to_mono: bool,

    /// Resample the finished PCM to this rate; `None` keeps the source rate
    pub target_sample_rate: Option<u32>,

    /// Reject sources whose rate differs from this pin; `None` accepts any
    /// rate (and leaves rate conversion to `target_sample_rate`)
    pub require_source_rate: Option<u32>,

    /// Cooperative cancellation flag, checked once per loop iteration
    pub cancel: Option<Arc<AtomicBool>>,
}

/// What one finished run produced.
#[derive(Debug, Clone)]
pub struct ClipSummary {
    /// Bytes of (transformed, pre-resample) PCM written
    pub pcm_bytes: u64,

    /// Channel count of the output PCM
    pub output_channels: u16,

    /// Sample rate of the output PCM
    pub output_sample_rate: u32,

    /// Present when a whole-file resample ran after the loop
    pub resample: Option<ResampleReport>,
}

/// Intermediate PCM path used when a post-loop resample is configured.
fn intermediate_path(output: &Path) -> PathBuf {
    let mut os = output.as_os_str().to_os_string();
    os.push(".raw");
    PathBuf::from(os)
}

/// Setup-time validation of the selected track against the options.
fn validate_track(track: &TrackInfo, options: &ClipOptions) -> Result<()> {
    if track.channels != 1 && track.channels != 2 {
        return Err(Error::UnsupportedChannelLayout {
            channels: track.channels,
        });
    }
    if let Some(required) = options.require_source_rate {
        if track.sample_rate != required {
            return Err(Error::UnsupportedSampleRate {
                rate: track.sample_rate,
                required,
            });
        }
    }
    Ok(())
}

/// One-shot extraction pipeline over a source container.
///
/// Owns its demultiplexer, decoder, and output sink exclusively; all three
/// are released exactly once when [`run`](AudioClipper::run) returns,
/// whichever exit path is taken.
pub struct AudioClipper {
    source: Box<dyn MediaSource>,
    decoder: Box<dyn PcmDecoder>,
    sink: PcmSink,
    track: TrackInfo,
    range: ClipRange,
    options: ClipOptions,
    output_path: PathBuf,
    pcm_path: PathBuf,
    extract_done: bool,
    decode_done: bool,
}

impl AudioClipper {
    /// Open a source container and configure the pipeline.
    ///
    /// Any failure here (destination unwritable, no audio track, unsupported
    /// layout or rate, decoder configuration) aborts construction; no
    /// partially configured pipeline is returned.
    pub fn open(
        input: &Path,
        output: &Path,
        range: ClipRange,
        options: ClipOptions,
    ) -> Result<Self> {
        let pcm_path = if options.target_sample_rate.is_some() {
            intermediate_path(output)
        } else {
            output.to_path_buf()
        };
        let sink = PcmSink::create(&pcm_path)?;

        let mut source = SymphoniaSource::open(input)?;
        let track_index = first_audio_track(source.tracks())?;
        source.select_track(track_index)?;
        let track = source.tracks()[track_index].clone();
        validate_track(&track, &options)?;

        info!(
            "selected track {}: {} ({} ch, {} Hz)",
            track.index, track.mime, track.channels, track.sample_rate
        );

        let params = source.codec_params(track_index)?;
        let decoder = SymphoniaPcmDecoder::new(params)?;

        Self::from_parts(
            Box::new(source),
            Box::new(decoder),
            sink,
            track,
            range,
            options,
            output,
        )
    }

    /// Assemble a pipeline from already-built collaborators.
    ///
    /// Applies the same track validation as [`open`](AudioClipper::open);
    /// the sink's path is taken as the PCM destination.
    pub fn from_parts(
        source: Box<dyn MediaSource>,
        decoder: Box<dyn PcmDecoder>,
        sink: PcmSink,
        track: TrackInfo,
        range: ClipRange,
        options: ClipOptions,
        output: &Path,
    ) -> Result<Self> {
        validate_track(&track, &options)?;
        let pcm_path = sink.path().to_path_buf();
        Ok(Self {
            source,
            decoder,
            sink,
            track,
            range,
            options,
            output_path: output.to_path_buf(),
            pcm_path,
            extract_done: false,
            decode_done: false,
        })
    }

    /// Run the extraction to completion.
    ///
    /// `progress` receives `"0 %"` immediately after the seek and a clamped
    /// percentage on every extract step that submits an in-range sample. No
    /// terminal progress value is guaranteed; completion is this function
    /// returning.
    pub fn run<F>(mut self, mut progress: F) -> Result<ClipSummary>
    where
        F: FnMut(&str),
    {
        let loop_result = self.run_loop(&mut progress);

        // Scoped release: decoder stopped, sink closed, source dropped,
        // exactly once each, on every exit path.
        let stop_result = self.decoder.stop();
        let finish_result = self.sink.finish();
        let AudioClipper {
            source,
            decoder,
            sink,
            track,
            options,
            output_path,
            pcm_path,
            ..
        } = self;
        drop(decoder);
        drop(source);
        drop(sink);

        loop_result?;
        stop_result?;
        let pcm_bytes = finish_result?;

        let output_channels = if options.downmix_to_mono && track.channels == 2 {
            1
        } else {
            track.channels
        };

        let (output_sample_rate, resample) = match options.target_sample_rate {
            Some(dst_rate) => {
                let report = resample_pcm_file(
                    &pcm_path,
                    &output_path,
                    track.sample_rate,
                    dst_rate,
                    output_channels,
                )?;
                if pcm_path != output_path {
                    let _ = fs::remove_file(&pcm_path);
                }
                (dst_rate, Some(report))
            }
            None => (track.sample_rate, None),
        };

        info!(
            "extraction finished: {pcm_bytes} PCM bytes, {output_channels} ch at {output_sample_rate} Hz"
        );

        Ok(ClipSummary {
            pcm_bytes,
            output_channels,
            output_sample_rate,
            resample,
        })
    }

    fn run_loop(&mut self, progress: &mut dyn FnMut(&str)) -> Result<()> {
        self.source.seek_to_sync_before(self.range.start_us())?;
        progress("0 %");

        while !(self.extract_done && self.decode_done) {
            if let Some(cancel) = &self.options.cancel {
                if cancel.load(Ordering::Relaxed) {
                    debug!("cancellation requested");
                    return Err(Error::Cancelled);
                }
            }
            if !self.extract_done {
                self.extract_done = self.extract_step(progress)?;
            }
            if !self.decode_done {
                self.decode_done = self.decode_step()?;
            }
        }
        Ok(())
    }

    /// Pull one compressed sample into the decoder.
    ///
    /// Returns whether extraction is now complete. A timed-out slot reserve
    /// is a no-op; the step is retried on the next iteration.
    fn extract_step(&mut self, progress: &mut dyn FnMut(&str)) -> Result<bool> {
        let Some(mut input) = self.decoder.dequeue_input(CODEC_TIMEOUT)? else {
            return Ok(false);
        };

        match self.source.read_sample(&mut input.data)? {
            Some(meta) if meta.pts_us < self.range.end_us() => {
                let pct = self.range.progress_percent(meta.pts_us);
                progress(&format!("{pct} %"));
                input.pts_us = meta.pts_us;
                self.decoder.queue_input(input)?;
                self.source.advance()?;
                Ok(false)
            }
            // Source exhausted, or the sample starts at/after the range end:
            // submit the end-of-stream marker and leave the reader in place.
            _ => {
                debug!("extraction reached end of stream");
                input.data.clear();
                input.pts_us = 0;
                input.eos = true;
                self.decoder.queue_input(input)?;
                Ok(true)
            }
        }
    }

    /// Drain one decoded buffer, transform it, and persist it.
    ///
    /// Returns whether decoding is now complete (the decoder emitted its
    /// end-of-stream marker, possibly alongside final payload).
    fn decode_step(&mut self) -> Result<bool> {
        let Some(output) = self.decoder.dequeue_output(CODEC_TIMEOUT)? else {
            return Ok(false);
        };

        let done = output.eos;
        if done {
            debug!("decoding reached end of stream");
        }
        if !output.data.is_empty() {
            let transformed = pcm::transform(
                &output.data,
                self.track.channels,
                self.options.downmix_to_mono,
            );
            self.sink.append(&transformed)?;
        }
        self.decoder.release_output(output);
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intermediate_path_keeps_output_name() {
        let path = intermediate_path(Path::new("/tmp/clip.pcm"));
        assert_eq!(path, Path::new("/tmp/clip.pcm.raw"));
    }

    #[test]
    fn test_validate_track_rejects_surround() {
        let track = TrackInfo {
            index: 0,
            mime: "audio/aac".into(),
            channels: 6,
            sample_rate: 48_000,
            bit_rate: None,
        };
        assert!(matches!(
            validate_track(&track, &ClipOptions::default()),
            Err(Error::UnsupportedChannelLayout { channels: 6 })
        ));
    }

    #[test]
    fn test_validate_track_pins_rate_when_asked() {
        let track = TrackInfo {
            index: 0,
            mime: "audio/aac".into(),
            channels: 2,
            sample_rate: 44_100,
            bit_rate: None,
        };
        let pinned = ClipOptions {
            require_source_rate: Some(48_000),
            ..Default::default()
        };
        assert!(matches!(
            validate_track(&track, &pinned),
            Err(Error::UnsupportedSampleRate {
                rate: 44_100,
                required: 48_000
            })
        ));
        assert!(validate_track(&track, &ClipOptions::default()).is_ok());
    }
}
