//! Player settings
//!
//! One `PlayerSettings` value is built by the application root (from defaults,
//! a config file, environment overrides) and lent by reference to the
//! components that need it. Nothing in the workspace reads settings from a
//! global.
//!
//! The visualizer gains, EQ ramp and frequency blend are presentation tuning.
//! Their defaults reproduce the look of the classic player and can be changed
//! freely without affecting correctness.

use crate::error::{CoreError, Result};
use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Playback engine timing and initial modes
    pub playback: PlaybackSettings,

    /// Visualizer analysis and presentation tuning
    pub visualizer: VisualizerSettings,
}

impl PlayerSettings {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;
        self.visualizer.validate()
    }
}

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Seek targets closer than this to end-of-file count as track end (ms)
    pub end_of_file_epsilon_ms: u64,

    /// Delay before the completion re-entrancy guard is released (ms)
    pub completion_grace_ms: u64,

    /// Delay before the seek guard relaxes (ms)
    pub seek_guard_ms: u64,

    /// Progress reporting interval (ms), 100 ms = 10 Hz
    pub progress_interval_ms: u64,

    /// `previous` restarts the current track past this position (seconds)
    pub previous_restart_threshold_secs: f64,

    /// Initial output volume (0.0 - 1.0)
    pub volume: f32,

    /// Initial stereo balance (-1.0 left .. 1.0 right)
    pub balance: f32,

    /// Initial shuffle setting
    pub shuffle: bool,

    /// Initial repeat mode
    pub repeat: RepeatMode,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            end_of_file_epsilon_ms: 10,
            completion_grace_ms: 300,
            seek_guard_ms: 100,
            progress_interval_ms: 100,
            previous_restart_threshold_secs: 3.0,
            volume: 0.75,
            balance: 0.0,
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }
}

impl PlaybackSettings {
    /// End-of-file epsilon as seconds
    pub fn end_of_file_epsilon_secs(&self) -> f64 {
        self.end_of_file_epsilon_ms as f64 / 1000.0
    }

    /// Completion grace delay
    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    /// Seek guard delay
    pub fn seek_guard(&self) -> Duration {
        Duration::from_millis(self.seek_guard_ms)
    }

    /// Progress timer interval
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(CoreError::invalid_setting(
                "playback.progress_interval_ms",
                "must be greater than zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(CoreError::invalid_setting(
                "playback.volume",
                format!("{} is outside 0.0..=1.0", self.volume),
            ));
        }
        if !(-1.0..=1.0).contains(&self.balance) {
            return Err(CoreError::invalid_setting(
                "playback.balance",
                format!("{} is outside -1.0..=1.0", self.balance),
            ));
        }
        if self.previous_restart_threshold_secs < 0.0 {
            return Err(CoreError::invalid_setting(
                "playback.previous_restart_threshold_secs",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// Visualizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    /// UI poll rate in Hz
    pub poll_hz: f64,

    /// Number of spectrum bars computed on the render thread
    pub spectrum_bars: usize,

    /// Number of RMS bins computed on the render thread
    pub rms_bins: usize,

    /// Published oscilloscope length
    pub waveform_len: usize,

    /// High-resolution FFT bin count (transform size is twice this)
    pub fft_bins: usize,

    /// Largest render block analysed; longer blocks are truncated
    pub max_block_frames: usize,

    /// Samples fed to each Goertzel filter per block
    pub goertzel_max_samples: usize,

    /// Ring buffer capacity in frames
    pub ring_capacity_frames: usize,

    /// Exponential smoothing factor α (`α·prev + (1−α)·raw`)
    pub smoothing: f32,

    /// Peak-hold fall rate in units per second
    pub peak_fall_rate: f32,

    /// Gain applied to RMS bins
    pub rms_gain: f32,

    /// Fixed visual boost applied to Goertzel magnitudes
    pub spectrum_gain: f32,

    /// Fixed visual boost applied to FFT magnitudes
    pub fft_gain: f32,

    /// Equalization gain at the lowest band (dB)
    pub eq_low_db: f32,

    /// Equalization gain at the highest band (dB)
    pub eq_high_db: f32,

    /// Weight of the logarithmic frequency scale (remainder is linear)
    pub log_blend: f32,

    /// Lowest band centre frequency (Hz)
    pub min_frequency: f32,

    /// Highest band centre frequency ceiling (Hz)
    pub max_frequency: f32,

    /// Band ceiling as a fraction of sample rate
    pub nyquist_fraction: f32,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            poll_hz: 30.0,
            spectrum_bars: 20,
            rms_bins: 20,
            waveform_len: 576,
            fft_bins: 1024,
            max_block_frames: 4096,
            goertzel_max_samples: 1024,
            ring_capacity_frames: 16384,
            smoothing: 0.7,
            peak_fall_rate: 0.8,
            rms_gain: 4.0,
            spectrum_gain: 15.0,
            fft_gain: 4.0,
            eq_low_db: -8.0,
            eq_high_db: 8.0,
            log_blend: 0.91,
            min_frequency: 20.0,
            max_frequency: 16000.0,
            nyquist_fraction: 0.45,
        }
    }
}

impl VisualizerSettings {
    /// Poll interval derived from `poll_hz`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.poll_hz)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.poll_hz > 0.0 && self.poll_hz.is_finite()) {
            return Err(CoreError::invalid_setting(
                "visualizer.poll_hz",
                "must be a positive number",
            ));
        }
        for (field, value) in [
            ("visualizer.spectrum_bars", self.spectrum_bars),
            ("visualizer.rms_bins", self.rms_bins),
            ("visualizer.waveform_len", self.waveform_len),
            ("visualizer.fft_bins", self.fft_bins),
            ("visualizer.max_block_frames", self.max_block_frames),
            ("visualizer.goertzel_max_samples", self.goertzel_max_samples),
            ("visualizer.ring_capacity_frames", self.ring_capacity_frames),
        ] {
            if value == 0 {
                return Err(CoreError::invalid_setting(field, "must be greater than zero"));
            }
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(CoreError::invalid_setting(
                "visualizer.smoothing",
                format!("{} is outside 0.0..1.0", self.smoothing),
            ));
        }
        if !(0.0..=1.0).contains(&self.log_blend) {
            return Err(CoreError::invalid_setting(
                "visualizer.log_blend",
                format!("{} is outside 0.0..=1.0", self.log_blend),
            ));
        }
        if self.min_frequency <= 0.0 || self.min_frequency >= self.max_frequency {
            return Err(CoreError::invalid_setting(
                "visualizer.min_frequency",
                "must be positive and below max_frequency",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = PlayerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.playback.progress_interval(), Duration::from_millis(100));
        assert_eq!(settings.visualizer.fft_bins, 1024);
        assert_eq!(settings.visualizer.rms_gain, 4.0);
        assert_eq!(settings.visualizer.spectrum_gain, 15.0);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "playback": { "repeat": "all" }, "visualizer": { "smoothing": 0.25 } }"#;
        let settings: PlayerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.playback.repeat, RepeatMode::All);
        assert_eq!(settings.playback.completion_grace_ms, 300);
        assert_eq!(settings.visualizer.smoothing, 0.25);
        assert_eq!(settings.visualizer.poll_hz, 30.0);
    }

    #[test]
    fn rejects_zero_progress_interval() {
        let mut settings = PlayerSettings::default();
        settings.playback.progress_interval_ms = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("progress_interval_ms"));
    }

    #[test]
    fn rejects_smoothing_of_one() {
        let mut settings = PlayerSettings::default();
        settings.visualizer.smoothing = 1.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_sized_buffers() {
        let mut settings = PlayerSettings::default();
        settings.visualizer.fft_bins = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("fft_bins"));
    }

    #[test]
    fn poll_interval_is_thirty_hertz() {
        let interval = VisualizerSettings::default().poll_interval();
        assert!((interval.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
    }
}
