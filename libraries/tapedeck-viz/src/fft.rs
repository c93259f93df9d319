//! High-resolution FFT for external visualization renderers
//!
//! A `2 × bins` point real transform. The Hann window, the input, output and
//! scratch buffers are all allocated in [`FftEngine::new`]; `process` is
//! allocation-free and safe to call from the render thread.

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Windowed real FFT with fixed output size
pub struct FftEngine {
    bins: usize,
    size: usize,
    gain: f32,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
    waveform: Vec<f32>,
}

impl fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftEngine")
            .field("bins", &self.bins)
            .field("size", &self.size)
            .field("gain", &self.gain)
            .finish_non_exhaustive()
    }
}

impl FftEngine {
    /// Plan a transform producing `bin_count` magnitude bins
    ///
    /// A zero bin count is raised to one.
    pub fn new(bin_count: usize, gain: f32) -> Self {
        let bins = bin_count.max(1);
        let size = bins * 2;

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (size - 1) as f32).cos()))
            .collect();

        Self {
            bins,
            size,
            gain,
            fft,
            window,
            input,
            output,
            scratch,
            spectrum: vec![0.0; bins],
            waveform: vec![0.0; bins],
        }
    }

    /// Output bin count
    pub fn bin_count(&self) -> usize {
        self.bins
    }

    /// Transform size in samples
    pub fn transform_size(&self) -> usize {
        self.size
    }

    /// Precomputed Hann window
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Analyse the first `valid_count` samples
    ///
    /// Input is zero-padded or truncated to the transform size. Returns the
    /// magnitude spectrum (normalized by transform size, boosted, clamped to
    /// [0, 1]) and the raw waveform downsampled to the bin count.
    pub fn process(&mut self, samples: &[f32], valid_count: usize) -> (&[f32], &[f32]) {
        let valid = &samples[..valid_count.min(samples.len())];

        let used = valid.len().min(self.size);
        for ((slot, &sample), &w) in self.input.iter_mut().zip(valid).zip(&self.window) {
            *slot = sample * w;
        }
        self.input[used..].fill(0.0);

        let scale = 1.0 / self.size as f32;
        match self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
        {
            Ok(()) => {
                for (bin, c) in self.spectrum.iter_mut().zip(&self.output) {
                    let magnitude = (c.re * c.re + c.im * c.im).sqrt() * scale;
                    *bin = (magnitude * self.gain).clamp(0.0, 1.0);
                }
            }
            // Buffer lengths come from the plan, so this only guards the contract.
            Err(_) => self.spectrum.fill(0.0),
        }

        let stride = (valid.len() / self.bins).max(1);
        for (index, out) in self.waveform.iter_mut().enumerate() {
            *out = valid.get(index * stride).copied().unwrap_or(0.0);
        }

        (&self.spectrum, &self.waveform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_is_twice_the_bin_count() {
        let engine = FftEngine::new(1024, 4.0);
        assert_eq!(engine.bin_count(), 1024);
        assert_eq!(engine.transform_size(), 2048);
        assert_eq!(engine.window().len(), 2048);
    }

    #[test]
    fn hann_window_is_zero_at_edges_and_one_in_middle() {
        let engine = FftEngine::new(64, 1.0);
        let window = engine.window();
        assert!(window[0].abs() < 1e-6);
        assert!(window[127].abs() < 1e-6);
        assert!(window[63] > 0.99);
    }

    #[test]
    fn silence_produces_flat_zero_spectrum() {
        let mut engine = FftEngine::new(256, 4.0);
        let (spectrum, waveform) = engine.process(&[0.0; 512], 512);
        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.iter().all(|&v| v == 0.0));
        assert!(waveform.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn tone_lands_in_expected_bin() {
        let bins = 512;
        let size = bins * 2;
        let target_bin = 40;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * target_bin as f32 * i as f32 / size as f32).sin())
            .collect();

        let mut engine = FftEngine::new(bins, 1.0);
        let (spectrum, _) = engine.process(&samples, size);
        let loudest = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(target_bin));
        assert!(spectrum.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn waveform_stride_follows_valid_count() {
        let mut engine = FftEngine::new(4, 1.0);
        let samples: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let (_, waveform) = engine.process(&samples, 8);
        assert_eq!(waveform, &[0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut engine = FftEngine::new(8, 1.0);
        let (_, waveform) = engine.process(&[0.5, 0.25], 2);
        assert_eq!(waveform, &[0.5, 0.25, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn valid_count_beyond_slice_is_clamped() {
        let mut engine = FftEngine::new(4, 1.0);
        let (spectrum, _) = engine.process(&[0.1; 3], 100);
        assert_eq!(spectrum.len(), 4);
    }
}
