//! Goertzel filter bank for the bar spectrum
//!
//! One second-order recursive filter per bar. Band centres blend a
//! logarithmic and a linear frequency scale; an equalization ramp in dB
//! offsets the filter's natural low-frequency bias. Coefficients are cached
//! by `(bar_count, sample_rate)` so `cos`/`powf` never run per callback.

use std::f32::consts::PI;
use tapedeck_core::VisualizerSettings;

/// Presentation constants for the filter bank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumTuning {
    /// Fixed visual boost
    pub gain: f32,
    /// Equalization at the lowest band (dB)
    pub eq_low_db: f32,
    /// Equalization at the highest band (dB)
    pub eq_high_db: f32,
    /// Weight of the log scale in the band-centre blend
    pub log_blend: f32,
    /// Lowest band centre (Hz)
    pub min_frequency: f32,
    /// Absolute ceiling for band centres (Hz)
    pub max_frequency: f32,
    /// Ceiling as a fraction of the sample rate
    pub nyquist_fraction: f32,
    /// Samples fed to each filter per block
    pub max_samples: usize,
}

impl Default for SpectrumTuning {
    fn default() -> Self {
        Self::from_settings(&VisualizerSettings::default())
    }
}

impl SpectrumTuning {
    /// Tuning described by visualizer settings
    pub fn from_settings(settings: &VisualizerSettings) -> Self {
        Self {
            gain: settings.spectrum_gain,
            eq_low_db: settings.eq_low_db,
            eq_high_db: settings.eq_high_db,
            log_blend: settings.log_blend,
            min_frequency: settings.min_frequency,
            max_frequency: settings.max_frequency,
            nyquist_fraction: settings.nyquist_fraction,
            max_samples: settings.goertzel_max_samples,
        }
    }
}

/// Precomputed per-band filter constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoertzelCoefficient {
    /// Band centre frequency (Hz)
    pub frequency: f32,
    /// Recurrence coefficient `2·cos(ω)`
    pub coefficient: f32,
    /// Linear equalization gain
    pub equalization: f32,
}

/// Compute the coefficient table for `bar_count` bands at `sample_rate`
pub fn goertzel_coefficients(
    bar_count: usize,
    sample_rate: f32,
    tuning: &SpectrumTuning,
) -> Vec<GoertzelCoefficient> {
    let min_freq = tuning.min_frequency;
    let max_freq = tuning
        .max_frequency
        .min(sample_rate * tuning.nyquist_fraction)
        .max(min_freq);
    let span = bar_count.saturating_sub(1).max(1) as f32;

    (0..bar_count)
        .map(|i| {
            let t = i as f32 / span;
            let log_freq = min_freq * (max_freq / min_freq).powf(t);
            let linear_freq = min_freq + (max_freq - min_freq) * t;
            let frequency = tuning.log_blend * log_freq + (1.0 - tuning.log_blend) * linear_freq;

            let omega = 2.0 * PI * frequency / sample_rate;
            let db = tuning.eq_low_db + (tuning.eq_high_db - tuning.eq_low_db) * t;

            GoertzelCoefficient {
                frequency,
                coefficient: 2.0 * omega.cos(),
                equalization: 10f32.powf(db / 20.0),
            }
        })
        .collect()
}

/// Goertzel bar analyser
///
/// Owned by the render-thread tap.
#[derive(Debug, Clone)]
pub struct SpectrumEngine {
    tuning: SpectrumTuning,
    coefficients: Vec<GoertzelCoefficient>,
    key: Option<(usize, u32)>,
    window: usize,
    recomputes: u64,
}

impl SpectrumEngine {
    /// Create an unprepared engine
    pub fn new(tuning: SpectrumTuning) -> Self {
        Self {
            tuning,
            coefficients: Vec::new(),
            key: None,
            window: tuning.max_samples.max(1),
            recomputes: 0,
        }
    }

    /// Prepare for blocks of `frame_count` frames into `bar_count` bars
    ///
    /// Coefficients are rebuilt only when `bar_count` or `sample_rate`
    /// differs from the cached key.
    pub fn prepare(&mut self, frame_count: usize, bar_count: usize, sample_rate: u32) {
        self.window = frame_count.clamp(1, self.tuning.max_samples.max(1));

        let key = (bar_count, sample_rate);
        if self.key == Some(key) {
            return;
        }
        self.coefficients = goertzel_coefficients(bar_count, sample_rate as f32, &self.tuning);
        self.key = Some(key);
        self.recomputes += 1;
    }

    /// Whether `prepare` has run
    pub fn is_prepared(&self) -> bool {
        self.key.is_some()
    }

    /// Sample rate of the cached coefficients
    pub fn sample_rate(&self) -> Option<u32> {
        self.key.map(|(_, rate)| rate)
    }

    /// Number of coefficient rebuilds so far
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Current coefficient table
    pub fn coefficients(&self) -> &[GoertzelCoefficient] {
        &self.coefficients
    }

    /// Run the filter bank over `mono` and write magnitudes in [0, 1]
    ///
    /// Bars beyond the prepared count are zeroed.
    pub fn process(&self, mono: &[f32], out: &mut [f32]) {
        let n = mono.len().min(self.window);
        if n == 0 {
            out.fill(0.0);
            return;
        }
        let samples = &mono[..n];
        let inv_n = 1.0 / n as f32;

        for (bar, slot) in out.iter_mut().enumerate() {
            let Some(band) = self.coefficients.get(bar) else {
                *slot = 0.0;
                continue;
            };

            let c = band.coefficient;
            let (mut s1, mut s2) = (0.0f32, 0.0f32);
            for &x in samples {
                let s0 = x + c * s1 - s2;
                s2 = s1;
                s1 = s0;
            }

            let power = s1 * s1 + s2 * s2 - c * s1 * s2;
            let magnitude = power.max(0.0).sqrt() * inv_n;
            *slot = (magnitude * band.equalization * self.tuning.gain).clamp(0.0, 1.0);
        }
    }
}
