//! Render graph seam
//!
//! The engine drives audio hardware only through [`RenderGraph`]. The
//! desktop crate implements it on cpal; tests use a mock.
//!
//! Hardware semantics the engine relies on:
//! - `schedule_segment` replaces nothing; the engine stops the graph first.
//! - Every scheduled segment produces exactly one [`Completion`], either
//!   when it renders to its end or when `stop` cuts it short.
//! - Completions are delivered asynchronously over the channel returned by
//!   [`RenderGraph::completions`] and drained on the control context.

use crate::epoch::SeekEpoch;
use crate::error::Result;
use crossbeam_channel::Receiver;
use std::path::Path;

/// Format of an opened file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFileInfo {
    /// Frames per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Total length in frames
    pub length_frames: u64,
}

impl AudioFileInfo {
    /// Length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length_frames as f64 / f64::from(self.sample_rate)
    }
}

/// Notification that a segment finished or was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Epoch the segment was scheduled with
    pub epoch: SeekEpoch,
}

/// Hardware render graph
pub trait RenderGraph {
    /// Open `path` as the current file
    fn open(&mut self, path: &Path) -> Result<AudioFileInfo>;

    /// Schedule `frame_count` frames starting at `start_frame`
    fn schedule_segment(&mut self, start_frame: u64, frame_count: u64, epoch: SeekEpoch)
        -> Result<()>;

    /// Start or resume rendering
    fn play(&mut self) -> Result<()>;

    /// Pause rendering, keeping the segment
    fn pause(&mut self);

    /// Stop rendering and drop the segment, completing it
    fn stop(&mut self);

    /// Frames rendered from the current segment
    fn rendered_frames(&self) -> u64;

    /// Whether the graph is rendering
    fn is_running(&self) -> bool;

    /// Output gain (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Stereo balance (-1.0 - 1.0)
    fn set_balance(&mut self, balance: f32);

    /// Completion notifications
    fn completions(&self) -> Receiver<Completion>;
}
