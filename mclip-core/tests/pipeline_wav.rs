//! End-to-end pipeline tests over generated WAV fixtures
//!
//! Fixtures are written with hound into temp directories, then pulled
//! through the full symphonia-backed demux/decode pipeline.

use hound::{SampleFormat, WavSpec, WavWriter};
use mclip_core::error::Error;
use mclip_core::wav::wrap_pcm_as_wav;
use mclip_core::{AudioClipper, ClipOptions, ClipRange};
use std::path::{Path, PathBuf};

const RATE: u32 = 48_000;
const SECONDS: u32 = 5;

fn wav_spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// 5 s stereo fixture with every sample on both channels equal to `value`.
fn write_constant_stereo_wav(path: &Path, value: i16) {
    let mut writer = WavWriter::create(path, wav_spec(2)).unwrap();
    for _ in 0..(RATE * SECONDS) {
        writer.write_sample(value).unwrap();
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

/// 5 s mono fixture whose sample value is the frame's millisecond index, so
/// output samples reveal exactly which part of the timeline was extracted.
fn write_ramp_mono_wav(path: &Path) {
    let mut writer = WavWriter::create(path, wav_spec(1)).unwrap();
    for frame in 0..(RATE * SECONDS) {
        writer.write_sample((frame / (RATE / 1000)) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn read_samples(path: &Path) -> Vec<i16> {
    std::fs::read(path)
        .unwrap()
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn fixture(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn test_clips_stereo_to_mono_with_progress() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 1000);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let options = ClipOptions {
        downmix_to_mono: true,
        ..Default::default()
    };
    let clipper = AudioClipper::open(&input, &output, range, options).unwrap();

    let mut progress = Vec::new();
    let summary = clipper.run(|pct| progress.push(pct.to_string())).unwrap();

    assert_eq!(summary.output_channels, 1);
    assert_eq!(summary.output_sample_rate, RATE);
    assert!(summary.resample.is_none());

    // ~2 s of mono at 48 kHz; the sync seek may start slightly early and the
    // final packet may straddle the range end
    let samples = read_samples(&output);
    assert!(
        samples.len() >= 90_000 && samples.len() <= 150_000,
        "unexpected output frame count: {}",
        samples.len()
    );

    // (1000 + 1000) / 2 == 1000: the downmix must be exact
    assert!(samples.iter().all(|&s| s == 1000));

    // First report is the post-seek zero, the rest are clamped percentages
    assert_eq!(progress[0], "0 %");
    let values: Vec<u64> = progress
        .iter()
        .map(|p| p.strip_suffix(" %").unwrap().parse().unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values.iter().all(|&v| v <= 100));
    assert!(
        *values.last().unwrap() >= 70,
        "progress should approach completion, got {:?}",
        values.last()
    );
}

#[test]
fn test_extracted_window_matches_requested_range() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "ramp.wav");
    let output = fixture(&dir, "clip.pcm");
    write_ramp_mono_wav(&input);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let clipper =
        AudioClipper::open(&input, &output, range, ClipOptions::default()).unwrap();
    clipper.run(|_| {}).unwrap();

    let samples = read_samples(&output);
    assert!(!samples.is_empty());

    // Extraction starts at a sync point at or before the range start
    let first = samples[0];
    assert!(first <= 1000, "started at {first} ms, after the range start");

    // Samples are the source's contiguous timeline: values step by 0 or 1
    assert!(samples
        .windows(2)
        .all(|w| w[1] == w[0] || w[1] == w[0] + 1));

    // Extraction stops at the first sample past the range end, give or take
    // the final packet
    let last = *samples.last().unwrap();
    assert!(
        (2970..=3200).contains(&last),
        "ended at {last} ms instead of the range end"
    );
}

#[test]
fn test_rerun_truncates_destination() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 1000);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let options = ClipOptions {
        downmix_to_mono: true,
        ..Default::default()
    };

    let clipper = AudioClipper::open(&input, &output, range, options.clone()).unwrap();
    clipper.run(|_| {}).unwrap();
    let first_len = std::fs::metadata(&output).unwrap().len();

    let clipper = AudioClipper::open(&input, &output, range, options).unwrap();
    clipper.run(|_| {}).unwrap();
    let second_len = std::fs::metadata(&output).unwrap().len();

    assert_eq!(first_len, second_len, "re-run must overwrite, not append");
}

#[test]
fn test_resamples_to_target_rate() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 1000);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let options = ClipOptions {
        downmix_to_mono: true,
        target_sample_rate: Some(44_100),
        ..Default::default()
    };
    let clipper = AudioClipper::open(&input, &output, range, options).unwrap();
    let summary = clipper.run(|_| {}).unwrap();

    assert_eq!(summary.output_sample_rate, 44_100);
    let report = summary.resample.expect("resample should have run");
    assert_eq!(report.src_rate, RATE);
    assert_eq!(report.dst_rate, 44_100);

    let expected = (report.input_frames as f64 * 44_100.0 / RATE as f64) as usize;
    assert!(
        report.output_frames.abs_diff(expected) <= 256,
        "expected ~{} frames, got {}",
        expected,
        report.output_frames
    );

    // Output holds the resampled mono PCM; the intermediate is cleaned up
    let output_bytes = std::fs::metadata(&output).unwrap().len();
    assert_eq!(output_bytes, report.output_frames as u64 * 2);
    let mut intermediate = output.as_os_str().to_os_string();
    intermediate.push(".raw");
    assert!(!PathBuf::from(intermediate).exists());
}

#[test]
fn test_range_running_past_end_of_source() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 500);

    // Range extends far past the 5 s fixture; extraction ends at source EOF
    let range = ClipRange::from_millis(4000, 20_000).unwrap();
    let options = ClipOptions {
        downmix_to_mono: true,
        ..Default::default()
    };
    let clipper = AudioClipper::open(&input, &output, range, options).unwrap();

    let mut values: Vec<u64> = Vec::new();
    clipper
        .run(|pct| values.push(pct.strip_suffix(" %").unwrap().parse().unwrap()))
        .unwrap();

    // ~1 s of source remained
    let samples = read_samples(&output);
    assert!(
        samples.len() >= 40_000 && samples.len() <= 60_000,
        "unexpected output frame count: {}",
        samples.len()
    );
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values.iter().all(|&v| v <= 100));
}

#[test]
fn test_pinned_source_rate_rejects_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 1000);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let options = ClipOptions {
        require_source_rate: Some(44_100),
        ..Default::default()
    };
    let result = AudioClipper::open(&input, &output, range, options);
    assert!(matches!(
        result,
        Err(Error::UnsupportedSampleRate {
            rate: RATE,
            required: 44_100
        })
    ));
}

#[test]
fn test_clip_output_wraps_as_wav() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture(&dir, "source.wav");
    let output = fixture(&dir, "clip.pcm");
    write_constant_stereo_wav(&input, 1000);

    let range = ClipRange::from_millis(1000, 3000).unwrap();
    let options = ClipOptions {
        downmix_to_mono: true,
        ..Default::default()
    };
    let clipper = AudioClipper::open(&input, &output, range, options).unwrap();
    let summary = clipper.run(|_| {}).unwrap();

    let wav_path = fixture(&dir, "clip.wav");
    wrap_pcm_as_wav(
        &output,
        &wav_path,
        summary.output_sample_rate,
        summary.output_channels,
    )
    .unwrap();

    let reader = hound::WavReader::open(&wav_path).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.len() as u64, summary.pcm_bytes / 2);
}
