//! mclip - trim a media file's audio track to a time range
//!
//! Runs the extraction pipeline on a dedicated worker thread and marshals
//! progress strings back to the control thread for display.

use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use mclip_core::{wav::wrap_pcm_as_wav, AudioClipper, ClipOptions, ClipRange};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mclip
#[derive(Parser, Debug)]
#[command(name = "mclip")]
#[command(about = "Extract a time range of a media file's audio track as PCM")]
#[command(version)]
struct Args {
    /// Source media container
    input: PathBuf,

    /// Destination path for the extracted PCM
    output: PathBuf,

    /// Range start in milliseconds
    #[arg(long)]
    start_ms: u64,

    /// Range end in milliseconds
    #[arg(long)]
    end_ms: u64,

    /// Downmix stereo to mono
    #[arg(long)]
    mono: bool,

    /// Resample the output to this rate in Hz
    #[arg(long)]
    rate: Option<u32>,

    /// Reject sources whose sample rate differs from this pin in Hz
    #[arg(long)]
    require_rate: Option<u32>,

    /// Also wrap the output in a WAV header (written next to the output)
    #[arg(long)]
    wav: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mclip=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let range = ClipRange::from_millis(args.start_ms, args.end_ms)
        .context("invalid --start-ms/--end-ms range")?;
    let options = ClipOptions {
        downmix_to_mono: args.mono,
        target_sample_rate: args.rate,
        require_source_rate: args.require_rate,
        cancel: None,
    };

    info!(
        "extracting {} ms - {} ms of {} to {}",
        args.start_ms,
        args.end_ms,
        args.input.display(),
        args.output.display()
    );

    let clipper = AudioClipper::open(&args.input, &args.output, range, options)
        .context("failed to set up extraction pipeline")?;

    // The pipeline runs on its own thread; progress comes back over a channel
    // so printing never stalls the extraction loop.
    let (progress_tx, progress_rx) = crossbeam_channel::unbounded::<String>();
    let worker = thread::spawn(move || {
        clipper.run(|pct| {
            let _ = progress_tx.send(pct.to_string());
        })
    });

    for pct in progress_rx {
        eprintln!("{pct}");
    }

    let summary = worker
        .join()
        .map_err(|_| anyhow::anyhow!("extraction worker panicked"))?
        .context("extraction failed")?;

    if let Some(report) = &summary.resample {
        info!(
            "resampled {} frames at {} Hz to {} frames at {} Hz",
            report.input_frames, report.src_rate, report.output_frames, report.dst_rate
        );
    }

    if args.wav {
        let wav_path = args.output.with_extension("wav");
        wrap_pcm_as_wav(
            &args.output,
            &wav_path,
            summary.output_sample_rate,
            summary.output_channels,
        )
        .context("failed to wrap output as WAV")?;
        info!("wrote {}", wav_path.display());
    }

    info!(
        "done: {} PCM bytes, {} ch at {} Hz",
        summary.pcm_bytes, summary.output_channels, summary.output_sample_rate
    );
    Ok(())
}
