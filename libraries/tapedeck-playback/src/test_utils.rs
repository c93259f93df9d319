//! Deterministic collaborators for engine tests
//!
//! Enabled by the `test-utils` feature.

use crate::clock::Clock;
use crate::epoch::SeekEpoch;
use crate::error::{PlaybackError, Result};
use crate::render::{AudioFileInfo, Completion, RenderGraph};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep a handle after boxing
/// one into the engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    elapsed_nanos: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Create a clock at an arbitrary origin
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

/// Segment scheduled on the mock graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSegment {
    /// First frame
    pub start_frame: u64,
    /// Frame count
    pub frame_count: u64,
    /// Epoch it was scheduled with
    pub epoch: SeekEpoch,
}

/// Operations observed by the mock graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphCall {
    /// `open`
    Open(PathBuf),
    /// `schedule_segment`
    Schedule(MockSegment),
    /// `play`
    Play,
    /// `pause`
    Pause,
    /// `stop`
    Stop,
}

/// Render graph that renders in simulated time
///
/// Completions are sent on a real channel, as hardware would, and only
/// become visible to the engine on its next `pump`.
#[derive(Debug)]
pub struct MockRenderGraph {
    files: HashMap<PathBuf, AudioFileInfo>,
    current: Option<AudioFileInfo>,
    segment: Option<MockSegment>,
    rendered: u64,
    running: bool,
    volume: f32,
    balance: f32,
    calls: Vec<GraphCall>,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
}

impl Default for MockRenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRenderGraph {
    /// Create a graph with no known files
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            files: HashMap::new(),
            current: None,
            segment: None,
            rendered: 0,
            running: false,
            volume: 1.0,
            balance: 0.0,
            calls: Vec::new(),
            completion_tx,
            completion_rx,
        }
    }

    /// Register a file that `open` will accept
    #[must_use]
    pub fn with_file(
        mut self,
        path: impl Into<PathBuf>,
        sample_rate: u32,
        length_frames: u64,
    ) -> Self {
        self.files.insert(
            path.into(),
            AudioFileInfo {
                sample_rate,
                channels: 2,
                length_frames,
            },
        );
        self
    }

    /// Render for `by` of simulated time
    ///
    /// Reaching the end of the segment posts its completion.
    pub fn advance(&mut self, by: Duration) {
        let (Some(info), Some(segment)) = (self.current, self.segment) else {
            return;
        };
        if !self.running {
            return;
        }
        let frames = (by.as_secs_f64() * f64::from(info.sample_rate)).round() as u64;
        self.rendered = (self.rendered + frames).min(segment.frame_count);
        if self.rendered == segment.frame_count {
            self.running = false;
            self.segment = None;
            self.post_completion(segment.epoch);
        }
    }

    /// Send a completion as if hardware had delivered one
    pub fn post_completion(&self, epoch: SeekEpoch) {
        // Receiver lives in self, so the send cannot fail.
        let _ = self.completion_tx.send(Completion { epoch });
    }

    /// Scheduled segment, if any
    pub fn segment(&self) -> Option<MockSegment> {
        self.segment
    }

    /// Every call made so far
    pub fn calls(&self) -> &[GraphCall] {
        &self.calls
    }

    /// Number of `schedule_segment` calls
    pub fn schedule_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GraphCall::Schedule(_)))
            .count()
    }

    /// Last volume applied
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Last balance applied
    pub fn balance(&self) -> f32 {
        self.balance
    }
}

impl RenderGraph for MockRenderGraph {
    fn open(&mut self, path: &Path) -> Result<AudioFileInfo> {
        self.calls.push(GraphCall::Open(path.to_path_buf()));
        let info = self
            .files
            .get(path)
            .copied()
            .ok_or_else(|| PlaybackError::load(path, "file not found"))?;
        self.current = Some(info);
        Ok(info)
    }

    fn schedule_segment(
        &mut self,
        start_frame: u64,
        frame_count: u64,
        epoch: SeekEpoch,
    ) -> Result<()> {
        if self.current.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let segment = MockSegment {
            start_frame,
            frame_count,
            epoch,
        };
        self.calls.push(GraphCall::Schedule(segment));
        self.segment = Some(segment);
        self.rendered = 0;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.calls.push(GraphCall::Play);
        self.running = self.segment.is_some();
        Ok(())
    }

    fn pause(&mut self) {
        self.calls.push(GraphCall::Pause);
        self.running = false;
    }

    fn stop(&mut self) {
        self.calls.push(GraphCall::Stop);
        self.running = false;
        self.rendered = 0;
        if let Some(segment) = self.segment.take() {
            self.post_completion(segment.epoch);
        }
    }

    fn rendered_frames(&self) -> u64 {
        self.rendered
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_balance(&mut self, balance: f32) {
        self.balance = balance;
    }

    fn completions(&self) -> Receiver<Completion> {
        self.completion_rx.clone()
    }
}
