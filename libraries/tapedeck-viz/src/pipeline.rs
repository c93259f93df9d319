//! Visualizer pipeline
//!
//! Split in two halves that never share mutable state:
//!
//! - [`AudioTap`] runs on the render thread. It owns the scratch buffers,
//!   both analysis engines, the ring producer and the frame publisher.
//! - [`VisualizerPipeline`] runs on the UI poll timer. It owns the frame
//!   reader, the ring consumer and the smoothed levels.
//!
//! The tap is moved into a [`TapHost`] on install and moved back out on
//! removal, so a detached pipeline keeps its buffers for the next install.

use crate::error::Result;
use crate::fft::FftEngine;
use crate::ring_buffer::{RingBuffer, RingConsumer, RingProducer, RingTelemetry};
use crate::scratch::{FrameLayout, ScratchBuffers};
use crate::shared_frame::{FramePublisher, FrameReader, SharedFrame, VisualFrame};
use crate::spectrum::{SpectrumEngine, SpectrumTuning};
use std::time::Duration;
use tapedeck_core::VisualizerSettings;
use tracing::debug;

/// Channel count the ring starts with before the first block arrives
const INITIAL_CHANNELS: usize = 2;

/// Render graph that can run an [`AudioTap`] inside its callback
pub trait TapHost {
    /// Hand `tap` to the render thread
    ///
    /// Returns the tap back when no render graph is active.
    fn attach_tap(&mut self, tap: AudioTap) -> std::result::Result<(), AudioTap>;

    /// Take the tap back from the render thread
    fn detach_tap(&mut self) -> Option<AudioTap>;
}

/// Snapshot for an external shader host
#[derive(Debug, Clone, PartialEq)]
pub struct ButterchurnFrame {
    /// FFT magnitudes at full resolution
    pub spectrum_bins: Vec<f32>,
    /// Waveform at FFT bin resolution
    pub waveform_bins: Vec<f32>,
    /// Render timestamp of the source block
    pub timestamp_seconds: f64,
}

/// Render-thread half of the visualizer
///
/// `process` neither allocates nor blocks.
#[derive(Debug)]
pub struct AudioTap {
    scratch: ScratchBuffers,
    spectrum: SpectrumEngine,
    fft: FftEngine,
    ring: RingProducer,
    publisher: FramePublisher,
    layout: FrameLayout,
    rms_gain: f32,
    channels: usize,
    sample_rate: u32,
}

impl AudioTap {
    /// Analyse one interleaved render block
    ///
    /// Returns whether a snapshot was published. Blocks without channels or
    /// sample rate are skipped. A changed channel count flushes the ring
    /// into a new generation; a changed sample rate re-prepares the
    /// spectrum engine.
    pub fn process(
        &mut self,
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
        timestamp: f64,
    ) -> bool {
        if channels == 0 || sample_rate == 0 {
            return false;
        }
        if channels != self.channels && self.ring.reformat(channels) {
            self.channels = channels;
        }
        if sample_rate != self.sample_rate || !self.spectrum.is_prepared() {
            self.spectrum
                .prepare(self.layout.max_block_frames, self.layout.spectrum_bars, sample_rate);
            self.sample_rate = sample_rate;
        }

        let valid = self.scratch.mixdown(interleaved, channels);
        self.scratch.compute_rms(self.rms_gain);
        self.spectrum
            .process(&self.scratch.mono[..valid], &mut self.scratch.spectrum);

        let (fft_spectrum, fft_waveform) = self.fft.process(&self.scratch.mono, valid);
        self.scratch.store_fft(fft_spectrum, fft_waveform);

        if channels == self.channels {
            self.ring.write(interleaved, interleaved.len() / channels);
        }

        self.publisher.try_publish(&self.scratch, timestamp)
    }

    /// Ring telemetry seen from the producer
    pub fn ring_telemetry(&self) -> RingTelemetry {
        self.ring.telemetry()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapState {
    Detached,
    Attached,
}

/// UI-rate half of the visualizer
#[derive(Debug)]
pub struct VisualizerPipeline {
    settings: VisualizerSettings,
    state: TapState,
    parked: Option<AudioTap>,
    reader: FrameReader,
    pcm: RingConsumer,
    levels: Vec<f32>,
    peaks: Vec<f32>,
    latest: Option<VisualFrame>,
    pending_dt: f32,
}

impl VisualizerPipeline {
    /// Build the pipeline and its parked tap
    pub fn new(settings: &VisualizerSettings) -> Result<Self> {
        settings.validate()?;
        let (tap, reader, pcm) = Self::build_tap(settings);

        Ok(Self {
            settings: settings.clone(),
            state: TapState::Detached,
            parked: Some(tap),
            reader,
            pcm,
            levels: vec![0.0; settings.spectrum_bars],
            peaks: vec![0.0; settings.spectrum_bars],
            latest: None,
            pending_dt: 0.0,
        })
    }

    fn build_tap(settings: &VisualizerSettings) -> (AudioTap, FrameReader, RingConsumer) {
        let layout = FrameLayout::from_settings(settings);
        let (ring, pcm) = RingBuffer::new(settings.ring_capacity_frames, INITIAL_CHANNELS);
        let (publisher, reader) = SharedFrame::new(&layout);

        let tap = AudioTap {
            scratch: ScratchBuffers::new(&layout),
            spectrum: SpectrumEngine::new(SpectrumTuning::from_settings(settings)),
            fft: FftEngine::new(settings.fft_bins, settings.fft_gain),
            ring,
            publisher,
            layout,
            rms_gain: settings.rms_gain,
            channels: INITIAL_CHANNELS,
            sample_rate: 0,
        };
        (tap, reader, pcm)
    }

    // ===== Tap lifecycle =====

    /// Attach the tap to `host`
    ///
    /// A second install while attached is a no-op returning true. With no
    /// active render graph nothing changes and false is returned.
    pub fn install_tap(&mut self, host: &mut dyn TapHost) -> bool {
        if self.state == TapState::Attached {
            return true;
        }

        let tap = match self.parked.take() {
            Some(tap) => tap,
            None => {
                let (tap, reader, pcm) = Self::build_tap(&self.settings);
                self.reader = reader;
                self.pcm = pcm;
                tap
            }
        };

        match host.attach_tap(tap) {
            Ok(()) => {
                self.state = TapState::Attached;
                debug!("Visualizer tap installed");
                true
            }
            Err(tap) => {
                self.parked = Some(tap);
                debug!("No active render graph, tap not installed");
                false
            }
        }
    }

    /// Detach the tap from `host`
    pub fn remove_tap(&mut self, host: &mut dyn TapHost) {
        if self.state == TapState::Detached {
            return;
        }
        self.parked = host.detach_tap();
        self.state = TapState::Detached;
        debug!("Visualizer tap removed");
    }

    /// Whether the tap is attached to a render graph
    pub fn is_tap_installed(&self) -> bool {
        self.state == TapState::Attached
    }

    /// Poll cadence for the application timer
    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }

    // ===== UI tick =====

    /// Consume the latest snapshot and update smoothed levels
    ///
    /// `dt` is the time since the previous tick. Ticks without new data
    /// carry their `dt` forward so peak decay stays time-correct. Returns
    /// whether new data arrived.
    pub fn poll(&mut self, dt: Duration) -> bool {
        self.pending_dt += dt.as_secs_f32();
        let Some(frame) = self.reader.consume() else {
            return false;
        };

        let alpha = self.settings.smoothing;
        let fall = self.settings.peak_fall_rate * self.pending_dt;
        self.pending_dt = 0.0;

        for ((level, peak), &raw) in self
            .levels
            .iter_mut()
            .zip(self.peaks.iter_mut())
            .zip(&frame.spectrum)
        {
            *level = alpha * *level + (1.0 - alpha) * raw;
            *peak = (*peak - fall).max(*level);
        }

        self.latest = Some(frame);
        true
    }

    /// Smoothed bar levels
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    /// Peak-hold values per bar
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Smoothed bars resampled to `band_count` with perceptual log scaling
    pub fn get_frequency_data(&self, band_count: usize) -> Vec<f32> {
        resample_nearest(&self.levels, band_count)
            .into_iter()
            .map(perceptual_scale)
            .collect()
    }

    /// Latest raw RMS bins resampled to `band_count`
    pub fn get_rms_data(&self, band_count: usize) -> Vec<f32> {
        let rms = self.latest.as_ref().map_or(&[][..], |f| &f.rms[..]);
        resample_nearest(rms, band_count)
    }

    /// Latest oscilloscope samples resampled to `count`
    pub fn get_waveform_samples(&self, count: usize) -> Vec<f32> {
        let waveform = self.latest.as_ref().map_or(&[][..], |f| &f.waveform[..]);
        resample_nearest(waveform, count)
    }

    /// Latest high-resolution snapshot for a shader host
    pub fn butterchurn_frame(&self) -> ButterchurnFrame {
        match &self.latest {
            Some(frame) => ButterchurnFrame {
                spectrum_bins: frame.fft_spectrum.clone(),
                waveform_bins: frame.fft_waveform.clone(),
                timestamp_seconds: frame.timestamp,
            },
            None => ButterchurnFrame {
                spectrum_bins: vec![0.0; self.settings.fft_bins],
                waveform_bins: vec![0.0; self.settings.fft_bins],
                timestamp_seconds: 0.0,
            },
        }
    }

    // ===== PCM access =====

    /// Drain interleaved PCM from the ring into `dest`
    ///
    /// Returns frames copied; 0 means the caller should render silence.
    pub fn drain_pcm(&mut self, dest: &mut [f32]) -> usize {
        let channels = self.pcm.channels();
        self.pcm.read(dest, dest.len() / channels)
    }

    /// Interleave width of the PCM returned by [`Self::drain_pcm`]
    pub fn pcm_channels(&self) -> usize {
        self.pcm.channels()
    }

    /// Ring underrun and overrun counters
    pub fn ring_telemetry(&self) -> RingTelemetry {
        self.pcm.telemetry()
    }
}

/// Map `source` onto `count` outputs by nearest index
pub fn resample_nearest(source: &[f32], count: usize) -> Vec<f32> {
    if source.is_empty() {
        return vec![0.0; count];
    }
    (0..count)
        .map(|i| source[(i * source.len() / count).min(source.len() - 1)])
        .collect()
}

// log10(1 + 9v) keeps 0 and 1 fixed and lifts quiet bands.
fn perceptual_scale(value: f32) -> f32 {
    (1.0 + 9.0 * value.clamp(0.0, 1.0)).log10()
}
