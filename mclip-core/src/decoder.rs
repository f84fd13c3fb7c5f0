//! PCM decoder collaborator surface and symphonia-backed implementation
//!
//! The pipeline driver talks to the decoder through two independently-paced,
//! buffer-limited queues: it reserves input slots for compressed samples and
//! polls for decoded PCM buffers, each with a bounded wait. The production
//! implementation runs the symphonia codec on a dedicated thread fed by
//! bounded channels; slot recycling through free-list channels is what makes
//! the input-side wait meaningful.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, CodecRegistry, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, warn};

/// Bounded wait applied to each queue poll
pub const CODEC_TIMEOUT: Duration = Duration::from_millis(10);

/// Input slots in flight between driver and codec thread
const INPUT_SLOTS: usize = 4;

/// Decoded buffers in flight between codec thread and driver
const OUTPUT_SLOTS: usize = 4;

/// Process-wide codec registry, initialized once before any decoder is
/// constructed.
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<symphonia::default::codecs::MpaDecoder>();
        registry.register_all::<symphonia::default::codecs::PcmDecoder>();
        registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
        registry.register_all::<symphonia::default::codecs::FlacDecoder>();
        registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
        registry.register_all::<symphonia::default::codecs::AacDecoder>();
        registry
    })
}

/// A reserved decoder input slot.
///
/// Fill `data` with one compressed sample, stamp `pts_us`, and hand the slot
/// back via [`PcmDecoder::queue_input`]. An `eos` slot must carry no data.
#[derive(Debug)]
pub struct InputBuffer {
    pub data: Vec<u8>,
    pub pts_us: u64,
    pub eos: bool,
}

/// One decoded PCM buffer (interleaved 16-bit little-endian samples).
///
/// `eos` marks the decoder's last emission; it can co-occur with payload or
/// arrive empty. Ownership returns to the decoder via
/// [`PcmDecoder::release_output`].
#[derive(Debug)]
pub struct OutputBuffer {
    pub data: Vec<u8>,
    pub pts_us: u64,
    pub eos: bool,
}

/// Decoder with bounded input/output queues, polled by the pipeline driver.
pub trait PcmDecoder: Send {
    /// Reserve an input slot, waiting at most `timeout`. `None` means no
    /// slot freed up in time; the caller retries on a later iteration.
    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<InputBuffer>>;

    /// Submit a filled (or end-of-stream) input slot.
    fn queue_input(&mut self, input: InputBuffer) -> Result<()>;

    /// Poll for a decoded buffer, waiting at most `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> Result<Option<OutputBuffer>>;

    /// Return a decoded buffer to the decoder once its bytes are copied out.
    fn release_output(&mut self, output: OutputBuffer);

    /// Shut the decoder down. Idempotent; called exactly once per run by the
    /// driver, with `Drop` as the backstop.
    fn stop(&mut self) -> Result<()>;
}

/// Symphonia codec running on a dedicated thread behind bounded queues.
pub struct SymphoniaPcmDecoder {
    input_tx: Option<Sender<InputBuffer>>,
    slot_rx: Receiver<Vec<u8>>,
    output_rx: Receiver<OutputBuffer>,
    recycle_tx: Sender<Vec<u8>>,
    worker: Option<JoinHandle<()>>,
}

impl SymphoniaPcmDecoder {
    /// Create and configure a decoder for the given track parameters.
    ///
    /// Construction fails with `CodecConfiguration` when no registered codec
    /// handles the track; no thread or queue outlives a failed construction.
    pub fn new(params: CodecParameters) -> Result<Self> {
        let (input_tx, input_rx) = bounded::<InputBuffer>(INPUT_SLOTS);
        let (slot_tx, slot_rx) = bounded::<Vec<u8>>(INPUT_SLOTS);
        let (output_tx, output_rx) = bounded::<OutputBuffer>(OUTPUT_SLOTS);
        let (recycle_tx, recycle_rx) = bounded::<Vec<u8>>(OUTPUT_SLOTS);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        for _ in 0..INPUT_SLOTS {
            let _ = slot_tx.send(Vec::new());
        }

        let worker = std::thread::Builder::new()
            .name("mclip-decoder".into())
            .spawn(move || decode_worker(params, input_rx, slot_tx, output_tx, recycle_rx, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(Error::CodecConfiguration(
                    "decoder thread exited during startup".into(),
                ));
            }
        }

        Ok(Self {
            input_tx: Some(input_tx),
            slot_rx,
            output_rx,
            recycle_tx,
            worker: Some(worker),
        })
    }
}

impl PcmDecoder for SymphoniaPcmDecoder {
    fn dequeue_input(&mut self, timeout: Duration) -> Result<Option<InputBuffer>> {
        match self.slot_rx.recv_timeout(timeout) {
            Ok(mut data) => {
                data.clear();
                Ok(Some(InputBuffer {
                    data,
                    pts_us: 0,
                    eos: false,
                }))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Decode("decoder thread terminated".into()))
            }
        }
    }

    fn queue_input(&mut self, input: InputBuffer) -> Result<()> {
        let tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| Error::Decode("decoder already stopped".into()))?;
        // Never blocks: slots and queue share one bound
        tx.send(input)
            .map_err(|_| Error::Decode("decoder thread terminated".into()))
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<Option<OutputBuffer>> {
        match self.output_rx.recv_timeout(timeout) {
            Ok(output) => Ok(Some(output)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Decode("decoder thread terminated".into()))
            }
        }
    }

    fn release_output(&mut self, output: OutputBuffer) {
        // Hand the allocation back for reuse; a full recycle queue just drops it
        let _ = self.recycle_tx.try_send(output.data);
    }

    fn stop(&mut self) -> Result<()> {
        let Some(input_tx) = self.input_tx.take() else {
            return Ok(());
        };
        drop(input_tx);
        // Drain so a codec thread blocked on a full output queue can finish
        loop {
            match self.output_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| Error::Decode("decoder thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for SymphoniaPcmDecoder {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Codec thread body: pull compressed samples, decode, push interleaved
/// 16-bit LE PCM, and echo the end-of-stream marker onto the output queue.
fn decode_worker(
    params: CodecParameters,
    input_rx: Receiver<InputBuffer>,
    slot_tx: Sender<Vec<u8>>,
    output_tx: Sender<OutputBuffer>,
    recycle_rx: Receiver<Vec<u8>>,
    ready_tx: Sender<Result<()>>,
) {
    let mut decoder = match codec_registry().make(&params, &DecoderOptions::default()) {
        Ok(decoder) => {
            let _ = ready_tx.send(Ok(()));
            decoder
        }
        Err(e) => {
            let _ = ready_tx.send(Err(Error::CodecConfiguration(format!(
                "failed to create decoder: {e}"
            ))));
            return;
        }
    };

    for input in input_rx.iter() {
        if input.eos {
            debug!("decoder input reached end of stream");
            let _ = output_tx.send(OutputBuffer {
                data: Vec::new(),
                pts_us: input.pts_us,
                eos: true,
            });
            return;
        }

        let packet = Packet::new_from_slice(0, 0, 0, &input.data);
        let InputBuffer { data: slot, pts_us, .. } = input;

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let capacity = decoded.capacity() as u64;
                let mut samples = SampleBuffer::<i16>::new(capacity, spec);
                samples.copy_interleaved_ref(decoded);

                let mut data = recycle_rx.try_recv().unwrap_or_default();
                data.clear();
                data.reserve(samples.samples().len() * 2);
                for sample in samples.samples() {
                    data.extend_from_slice(&sample.to_le_bytes());
                }

                if output_tx
                    .send(OutputBuffer {
                        data,
                        pts_us,
                        eos: false,
                    })
                    .is_err()
                {
                    return;
                }
            }
            // A corrupt sample is skipped; the stream resumes at the next one
            Err(SymphoniaError::DecodeError(e)) => warn!("skipping undecodable sample: {e}"),
            Err(e) => {
                warn!("decoder failed: {e}");
                return;
            }
        }

        if slot_tx.send(slot).is_err() {
            return;
        }
    }
}
