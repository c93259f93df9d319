//! cpal-backed render graph
//!
//! ```text
//! Control context                Audio thread            cpal callback
//!        │                            │                        │
//!        │  open / schedule / play    │ owns the Stream        │
//!        │── lock(RenderState) ──────────────────────────────> │ try_lock(RenderState)
//!        │                            │                        │ copy segment, gain
//!        │                            │                        │ AudioTap::process
//!        │  completions() <───────────────────────────────────-│ try_send(Completion)
//! ```
//!
//! The callback never blocks: if the control context holds the state lock
//! it renders one block of silence. Transport position and running flag are
//! mirrored into atomics so progress polling never takes that lock. Files
//! are conformed to the device format at `open`, so segment bounds given in
//! file frames are converted to device frames here and rendered positions
//! are converted back.

use crate::decode::{decode_file, DecodedAudio};
use crate::error::{DesktopError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use tapedeck_playback::{AudioFileInfo, Completion, RenderGraph, SeekEpoch};
use tapedeck_viz::{AudioTap, TapHost};
use tracing::{debug, error, info, warn};

/// Capacity of the completion queue
const COMPLETION_QUEUE_SIZE: usize = 64;

/// Device output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    end: usize,
    cursor: usize,
    epoch: SeekEpoch,
}

/// Lock-free copy of the transport fields read by the control context
#[derive(Debug, Default)]
struct TransportMirror {
    rendered: AtomicUsize,
    running: AtomicBool,
}

impl TransportMirror {
    fn rendered(&self) -> usize {
        self.rendered.load(Ordering::Acquire)
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// State shared between the control context and the callback
struct RenderState {
    audio: Option<Arc<DecodedAudio>>,
    segment: Option<Segment>,
    rendered: usize,
    running: bool,
    volume: f32,
    balance: f32,
    tap: Option<AudioTap>,
    clock_frames: u64,
    mirror: Arc<TransportMirror>,
}

impl RenderState {
    fn new() -> Self {
        Self {
            audio: None,
            segment: None,
            rendered: 0,
            running: false,
            volume: 1.0,
            balance: 0.0,
            tap: None,
            clock_frames: 0,
            mirror: Arc::new(TransportMirror::default()),
        }
    }

    // Call after every change to `rendered` or `running`.
    fn publish_transport(&self) {
        self.mirror.rendered.store(self.rendered, Ordering::Release);
        self.mirror.running.store(self.running, Ordering::Release);
    }

    /// Render one callback block
    fn render(&mut self, out: &mut [f32], format: OutputFormat, completions: &Sender<Completion>) {
        out.fill(0.0);
        let channels = usize::from(format.channels.max(1));
        let frames = out.len() / channels;

        if self.running {
            if let (Some(audio), Some(segment)) = (self.audio.as_ref(), self.segment.as_mut()) {
                let n = frames.min(segment.end.saturating_sub(segment.cursor));
                let src =
                    &audio.samples[segment.cursor * channels..(segment.cursor + n) * channels];
                let (left, right) = channel_gains(self.volume, self.balance);

                for (dst, src) in out.chunks_exact_mut(channels).zip(src.chunks_exact(channels)) {
                    for (c, (d, s)) in dst.iter_mut().zip(src).enumerate() {
                        let gain = match (channels, c) {
                            (1, _) => self.volume,
                            (_, 0) => left,
                            (_, 1) => right,
                            _ => self.volume,
                        };
                        *d = s * gain;
                    }
                }

                segment.cursor += n;
                self.rendered += n;
                if segment.cursor >= segment.end {
                    let epoch = segment.epoch;
                    self.segment = None;
                    self.running = false;
                    if completions.try_send(Completion { epoch }).is_err() {
                        error!("Completion queue full; end of segment lost");
                    }
                }
                self.publish_transport();
            }
        }

        if let Some(tap) = self.tap.as_mut() {
            let timestamp = self.clock_frames as f64 / f64::from(format.sample_rate.max(1));
            tap.process(out, channels, format.sample_rate, timestamp);
        }
        self.clock_frames += frames as u64;
    }
}

/// Per-side gain for stereo balance
fn channel_gains(volume: f32, balance: f32) -> (f32, f32) {
    let left = volume * (1.0 - balance.max(0.0));
    let right = volume * (1.0 + balance.min(0.0));
    (left, right)
}

/// Callback body: render, or silence if the state is busy
fn render_callback(
    out: &mut [f32],
    shared: &Mutex<RenderState>,
    format: OutputFormat,
    completions: &Sender<Completion>,
) {
    match shared.try_lock() {
        Ok(mut state) => state.render(out, format, completions),
        Err(TryLockError::WouldBlock) => out.fill(0.0),
        Err(TryLockError::Poisoned(poisoned)) => {
            poisoned.into_inner().render(out, format, completions);
        }
    }
}

enum AudioCommand {
    Shutdown,
}

/// Render graph on the default cpal output device
pub struct CpalRenderGraph {
    shared: Arc<Mutex<RenderState>>,
    transport: Arc<TransportMirror>,
    format: OutputFormat,
    file: Option<AudioFileInfo>,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    command_tx: Sender<AudioCommand>,
    audio_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CpalRenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalRenderGraph")
            .field("format", &self.format)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl CpalRenderGraph {
    /// Open the default output device
    ///
    /// The stream is built and owned by a dedicated audio thread; this
    /// returns once it is running or has failed to start.
    pub fn new() -> Result<Self> {
        let state = RenderState::new();
        let transport = Arc::clone(&state.mirror);
        let shared = Arc::new(Mutex::new(state));
        let (completion_tx, completion_rx) = bounded(COMPLETION_QUEUE_SIZE);
        let (command_tx, command_rx) = bounded::<AudioCommand>(4);
        let (ready_tx, ready_rx) = bounded::<Result<OutputFormat>>(1);

        let shared_clone = Arc::clone(&shared);
        let completion_clone = completion_tx.clone();
        let audio_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                Self::audio_thread_run(shared_clone, completion_clone, command_rx, ready_tx);
            })?;

        let format = ready_rx
            .recv()
            .map_err(|_| DesktopError::AudioThreadGone)??;
        info!(
            "Audio output ready: {} Hz, {} channels",
            format.sample_rate, format.channels
        );

        Ok(Self {
            shared,
            transport,
            format,
            file: None,
            completion_tx,
            completion_rx,
            command_tx,
            audio_thread: Some(audio_thread),
        })
    }

    /// Audio thread main loop
    ///
    /// Owns the cpal Stream for its whole life and drops it on shutdown.
    fn audio_thread_run(
        shared: Arc<Mutex<RenderState>>,
        completions: Sender<Completion>,
        command_rx: Receiver<AudioCommand>,
        ready_tx: Sender<Result<OutputFormat>>,
    ) {
        let stream = match Self::build_stream(shared, completions) {
            Ok((stream, format)) => {
                let _ = ready_tx.send(Ok(format));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        while let Ok(command) = command_rx.recv() {
            match command {
                AudioCommand::Shutdown => break,
            }
        }
        drop(stream);
        debug!("Audio thread exiting");
    }

    fn build_stream(
        shared: Arc<Mutex<RenderState>>,
        completions: Sender<Completion>,
    ) -> Result<(Stream, OutputFormat)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DesktopError::DeviceNotFound)?;

        let supported = device.default_output_config()?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(DesktopError::UnsupportedFormat(format!(
                "device sample format {:?}",
                supported.sample_format()
            )));
        }

        let format = OutputFormat {
            sample_rate: supported.sample_rate(),
            channels: supported.channels(),
        };
        let config: StreamConfig = supported.config();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render_callback(data, &shared, format, &completions);
            },
            |err| warn!("Audio stream error: {}", err),
            None,
        )?;
        stream.play()?;

        Ok((stream, format))
    }

    /// Device format every file is conformed to
    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // File frames to device frames
    fn to_device_frames(&self, frames: u64) -> usize {
        let Some(file) = self.file else {
            return 0;
        };
        if file.sample_rate == self.format.sample_rate || file.sample_rate == 0 {
            return frames as usize;
        }
        (u128::from(frames) * u128::from(self.format.sample_rate) / u128::from(file.sample_rate))
            as usize
    }

    // Device frames to file frames
    fn to_file_frames(&self, frames: usize) -> u64 {
        let Some(file) = self.file else {
            return 0;
        };
        if file.sample_rate == self.format.sample_rate || self.format.sample_rate == 0 {
            return frames as u64;
        }
        (frames as u128 * u128::from(file.sample_rate) / u128::from(self.format.sample_rate)) as u64
    }

    // Drop the active segment, completing it.
    fn cancel_segment(&self, state: &mut RenderState) {
        state.running = false;
        state.rendered = 0;
        state.publish_transport();
        if let Some(segment) = state.segment.take() {
            let _ = self.completion_tx.try_send(Completion {
                epoch: segment.epoch,
            });
        }
    }
}

impl RenderGraph for CpalRenderGraph {
    fn open(&mut self, path: &Path) -> tapedeck_playback::Result<AudioFileInfo> {
        let decoded = decode_file(path)?;
        let info = AudioFileInfo {
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            length_frames: decoded.frames() as u64,
        };
        let conformed = decoded.conform(self.format.sample_rate, self.format.channels)?;

        let mut state = self.lock();
        self.cancel_segment(&mut state);
        state.audio = Some(Arc::new(conformed));
        drop(state);

        self.file = Some(info);
        Ok(info)
    }

    fn schedule_segment(
        &mut self,
        start_frame: u64,
        frame_count: u64,
        epoch: SeekEpoch,
    ) -> tapedeck_playback::Result<()> {
        if self.file.is_none() {
            return Err(tapedeck_playback::PlaybackError::NoTrackLoaded);
        }
        let start = self.to_device_frames(start_frame);
        let count = self.to_device_frames(frame_count);

        let mut state = self.lock();
        let available = state.audio.as_ref().map_or(0, |audio| audio.frames());
        let start = start.min(available);
        let end = (start + count).min(available);
        state.segment = Some(Segment {
            end,
            cursor: start,
            epoch,
        });
        state.rendered = 0;
        state.publish_transport();
        Ok(())
    }

    fn play(&mut self) -> tapedeck_playback::Result<()> {
        let mut state = self.lock();
        state.running = state.segment.is_some();
        state.publish_transport();
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        state.running = false;
        state.publish_transport();
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        self.cancel_segment(&mut state);
    }

    fn rendered_frames(&self) -> u64 {
        self.to_file_frames(self.transport.rendered())
    }

    fn is_running(&self) -> bool {
        self.transport.running()
    }

    fn set_volume(&mut self, volume: f32) {
        self.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn set_balance(&mut self, balance: f32) {
        self.lock().balance = balance.clamp(-1.0, 1.0);
    }

    fn completions(&self) -> Receiver<Completion> {
        self.completion_rx.clone()
    }
}

impl TapHost for CpalRenderGraph {
    fn attach_tap(&mut self, tap: AudioTap) -> std::result::Result<(), AudioTap> {
        let mut state = self.lock();
        if state.tap.is_some() {
            return Err(tap);
        }
        state.tap = Some(tap);
        Ok(())
    }

    fn detach_tap(&mut self) -> Option<AudioTap> {
        self.lock().tap.take()
    }
}

impl Drop for CpalRenderGraph {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}
