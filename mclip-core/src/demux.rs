//! Container demultiplexing via symphonia
//!
//! [`SymphoniaSource`] adapts a symphonia `FormatReader` to the
//! [`MediaSource`] surface the pipeline driver polls: a track table with
//! declared media types, coarse (sync-point) seeking, and a non-consuming
//! read/advance cursor over the selected track's compressed samples.

use crate::error::{Error, Result};
use crate::source::{MediaSource, SampleMeta};
use crate::track::TrackInfo;
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{CodecParameters, CodecType, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

/// Best-effort media type string for a symphonia codec.
///
/// Symphonia only models audio codecs; container tracks it cannot identify
/// (video, data) come through as `CODEC_TYPE_NULL`.
fn mime_for_codec(codec: CodecType) -> String {
    use symphonia::core::codecs::{
        CODEC_TYPE_AAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_OPUS, CODEC_TYPE_PCM_S16LE,
        CODEC_TYPE_VORBIS,
    };
    let mime = if codec == CODEC_TYPE_NULL {
        "application/octet-stream"
    } else if codec == CODEC_TYPE_AAC {
        "audio/aac"
    } else if codec == CODEC_TYPE_MP3 {
        "audio/mpeg"
    } else if codec == CODEC_TYPE_FLAC {
        "audio/flac"
    } else if codec == CODEC_TYPE_VORBIS {
        "audio/vorbis"
    } else if codec == CODEC_TYPE_OPUS {
        "audio/opus"
    } else if codec == CODEC_TYPE_PCM_S16LE {
        "audio/raw"
    } else {
        "audio/x-unknown"
    };
    mime.to_string()
}

/// File-backed demultiplexer over symphonia's format layer.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    tracks: Vec<TrackInfo>,
    /// Symphonia track id of the selected track
    selected: Option<u32>,
    /// Time base of the selected track, for pts conversion
    time_base: Option<TimeBase>,
    /// Fallback pts conversion when the track carries no time base
    sample_rate: u32,
    /// Sample under the read cursor; populated lazily by `read_sample`
    pending: Option<Packet>,
    ended: bool,
}

impl SymphoniaSource {
    /// Probe and open a media container.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the probe with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Demux(format!("failed to probe {}: {e}", path.display())))?;

        let format = probed.format;

        let tracks = format
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let params = &track.codec_params;
                TrackInfo {
                    index,
                    mime: mime_for_codec(params.codec),
                    channels: params.channels.map(|c| c.count() as u16).unwrap_or(0),
                    sample_rate: params.sample_rate.unwrap_or(0),
                    bit_rate: None,
                }
            })
            .collect::<Vec<_>>();

        debug!("probed {} track(s) from {}", tracks.len(), path.display());

        Ok(Self {
            format,
            tracks,
            selected: None,
            time_base: None,
            sample_rate: 0,
            pending: None,
            ended: false,
        })
    }

    /// Codec parameters of a track, for decoder construction.
    pub fn codec_params(&self, index: usize) -> Result<CodecParameters> {
        let track = self
            .format
            .tracks()
            .get(index)
            .ok_or_else(|| Error::Demux(format!("track index {index} out of range")))?;
        Ok(track.codec_params.clone())
    }

    fn pts_us(&self, ts: u64) -> u64 {
        if let Some(tb) = self.time_base {
            let Time { seconds, frac } = tb.calc_time(ts);
            seconds * 1_000_000 + (frac * 1_000_000.0) as u64
        } else if self.sample_rate > 0 {
            // Raw formats time packets in frames
            ts * 1_000_000 / self.sample_rate as u64
        } else {
            0
        }
    }
}

impl MediaSource for SymphoniaSource {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn select_track(&mut self, index: usize) -> Result<()> {
        let track = self
            .format
            .tracks()
            .get(index)
            .ok_or_else(|| Error::Demux(format!("track index {index} out of range")))?;
        self.selected = Some(track.id);
        self.time_base = track.codec_params.time_base;
        self.sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        self.pending = None;
        self.ended = false;
        Ok(())
    }

    fn seek_to_sync_before(&mut self, pts_us: u64) -> Result<()> {
        let track_id = self
            .selected
            .ok_or_else(|| Error::Demux("seek before track selection".into()))?;
        self.pending = None;
        self.ended = false;
        let time = Time::from(pts_us as f64 / 1_000_000.0);
        let seeked = self
            .format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(track_id),
                },
            )
            .map_err(|e| Error::Demux(format!("seek failed: {e}")))?;
        debug!(
            "seeked to ts {} (requested {})",
            seeked.actual_ts, seeked.required_ts
        );
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<SampleMeta>> {
        let track_id = self
            .selected
            .ok_or_else(|| Error::Demux("read before track selection".into()))?;
        if self.ended {
            return Ok(None);
        }
        if self.pending.is_none() {
            loop {
                match self.format.next_packet() {
                    Ok(packet) if packet.track_id() == track_id => {
                        self.pending = Some(packet);
                        break;
                    }
                    // Other tracks are not selected; skip their samples
                    Ok(_) => continue,
                    Err(SymphoniaError::IoError(ref e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        self.ended = true;
                        return Ok(None);
                    }
                    Err(SymphoniaError::ResetRequired) => {
                        warn!("format reader requested a reset; treating as end of stream");
                        self.ended = true;
                        return Ok(None);
                    }
                    Err(e) => return Err(Error::Demux(format!("failed to read sample: {e}"))),
                }
            }
        }
        let packet = self.pending.as_ref().unwrap();
        buf.clear();
        buf.extend_from_slice(packet.buf());
        Ok(Some(SampleMeta {
            size: packet.buf().len(),
            pts_us: self.pts_us(packet.ts()),
        }))
    }

    fn advance(&mut self) -> Result<()> {
        self.pending = None;
        Ok(())
    }
}
