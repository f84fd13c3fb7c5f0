//! Demultiplexer collaborator surface
//!
//! The pipeline driver pulls compressed samples through this trait rather
//! than talking to a container parser directly. The production implementation
//! is [`crate::demux::SymphoniaSource`]; tests drive the pipeline with
//! scripted sources.

use crate::error::Result;
use crate::track::TrackInfo;

/// Metadata for the sample currently under the read cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMeta {
    /// Size of the compressed sample in bytes
    pub size: usize,

    /// Presentation timestamp in microseconds
    pub pts_us: u64,
}

/// A demultiplexer yielding per-track compressed samples in presentation
/// order.
///
/// `read_sample` is non-consuming: repeated calls return the same sample
/// until `advance` moves the cursor. This keeps "stop before the sample past
/// the range end" expressible without pushback.
pub trait MediaSource: Send {
    /// Descriptors for every track in the container, in container order.
    fn tracks(&self) -> &[TrackInfo];

    /// Restrict sample reads to the given track.
    fn select_track(&mut self, index: usize) -> Result<()>;

    /// Position the read cursor at the nearest sync point at or before
    /// `pts_us`.
    fn seek_to_sync_before(&mut self, pts_us: u64) -> Result<()>;

    /// Copy the current compressed sample into `buf` (replacing its
    /// contents) and return its metadata, or `None` at end of stream.
    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<Option<SampleMeta>>;

    /// Move the read cursor to the next sample of the selected track.
    fn advance(&mut self) -> Result<()>;
}
