//! Per-callback working memory for the tap
//!
//! Everything here is allocated once and owned by the render-thread tap.
//! No method allocates.

/// Sizes of the scratch and published arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Longest analysed block in frames
    pub max_block_frames: usize,
    /// RMS bin count
    pub rms_bins: usize,
    /// Spectrum bar count
    pub spectrum_bars: usize,
    /// Published oscilloscope length
    pub waveform_len: usize,
    /// High-resolution FFT bin count
    pub fft_bins: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            max_block_frames: 4096,
            rms_bins: 20,
            spectrum_bars: 20,
            waveform_len: 576,
            fft_bins: 1024,
        }
    }
}

impl FrameLayout {
    /// Layout described by visualizer settings
    pub fn from_settings(settings: &tapedeck_core::VisualizerSettings) -> Self {
        Self {
            max_block_frames: settings.max_block_frames,
            rms_bins: settings.rms_bins,
            spectrum_bars: settings.spectrum_bars,
            waveform_len: settings.waveform_len,
            fft_bins: settings.fft_bins,
        }
    }
}

/// Pre-allocated analysis buffers
#[derive(Debug, Clone)]
pub struct ScratchBuffers {
    /// Mono mixdown; only `..valid_frames` is meaningful
    pub mono: Vec<f32>,
    /// RMS level per bin in [0, 1]
    pub rms: Vec<f32>,
    /// Goertzel bar magnitudes in [0, 1]
    pub spectrum: Vec<f32>,
    /// High-resolution FFT magnitudes
    pub fft_spectrum: Vec<f32>,
    /// Waveform downsampled to the FFT bin count
    pub fft_waveform: Vec<f32>,
    /// Frames of `mono` filled by the last mixdown
    pub valid_frames: usize,
}

impl ScratchBuffers {
    /// Allocate buffers for `layout`
    pub fn new(layout: &FrameLayout) -> Self {
        Self {
            mono: vec![0.0; layout.max_block_frames.max(1)],
            rms: vec![0.0; layout.rms_bins],
            spectrum: vec![0.0; layout.spectrum_bars],
            fft_spectrum: vec![0.0; layout.fft_bins],
            fft_waveform: vec![0.0; layout.fft_bins],
            valid_frames: 0,
        }
    }

    /// Average `channels` interleaved channels into `mono`
    ///
    /// Blocks longer than the scratch capacity are truncated. Returns the
    /// number of valid mono frames.
    pub fn mixdown(&mut self, interleaved: &[f32], channels: usize) -> usize {
        if channels == 0 {
            self.valid_frames = 0;
            return 0;
        }
        let frames = (interleaved.len() / channels).min(self.mono.len());
        let scale = 1.0 / channels as f32;

        for (out, frame) in self
            .mono
            .iter_mut()
            .zip(interleaved.chunks_exact(channels))
            .take(frames)
        {
            *out = frame.iter().sum::<f32>() * scale;
        }

        self.valid_frames = frames;
        frames
    }

    /// Valid part of the mono mixdown
    pub fn valid_mono(&self) -> &[f32] {
        &self.mono[..self.valid_frames]
    }

    /// Fill `rms` from equal slices of the mono block
    ///
    /// Each bin is the slice RMS times `gain`, clamped to [0, 1]. Bins with
    /// no samples become 0.
    pub fn compute_rms(&mut self, gain: f32) {
        let bins = self.rms.len();
        if bins == 0 {
            return;
        }
        let frames = self.valid_frames;

        for (index, bin) in self.rms.iter_mut().enumerate() {
            let start = index * frames / bins;
            let end = (index + 1) * frames / bins;
            let slice = &self.mono[start..end];
            *bin = if slice.is_empty() {
                0.0
            } else {
                let mean_square = slice.iter().map(|s| s * s).sum::<f32>() / slice.len() as f32;
                (mean_square.sqrt() * gain).clamp(0.0, 1.0)
            };
        }
    }

    /// Copy FFT engine outputs into the scratch arrays
    pub fn store_fft(&mut self, spectrum: &[f32], waveform: &[f32]) {
        copy_prefix(&mut self.fft_spectrum, spectrum);
        copy_prefix(&mut self.fft_waveform, waveform);
    }
}

fn copy_prefix(dest: &mut [f32], src: &[f32]) {
    let n = dest.len().min(src.len());
    dest[..n].copy_from_slice(&src[..n]);
    dest[n..].fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> FrameLayout {
        FrameLayout {
            max_block_frames: 8,
            rms_bins: 2,
            spectrum_bars: 4,
            waveform_len: 4,
            fft_bins: 4,
        }
    }

    #[test]
    fn mixdown_averages_channels() {
        let mut scratch = ScratchBuffers::new(&small_layout());
        let frames = scratch.mixdown(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(frames, 3);
        assert_eq!(scratch.valid_mono(), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn mixdown_truncates_long_blocks() {
        let mut scratch = ScratchBuffers::new(&small_layout());
        let block = vec![0.25f32; 20];
        assert_eq!(scratch.mixdown(&block, 1), 8);
        assert_eq!(scratch.valid_frames, 8);
    }

    #[test]
    fn rms_uses_equal_slices_and_clamps() {
        let mut scratch = ScratchBuffers::new(&small_layout());
        scratch.mixdown(&[0.1, -0.1, 0.1, -0.1, 0.9, -0.9, 0.9, -0.9], 1);
        scratch.compute_rms(4.0);
        assert!((scratch.rms[0] - 0.4).abs() < 1e-6);
        assert_eq!(scratch.rms[1], 1.0);
    }

    #[test]
    fn rms_of_empty_block_is_zero() {
        let mut scratch = ScratchBuffers::new(&small_layout());
        scratch.mixdown(&[], 2);
        scratch.compute_rms(4.0);
        assert!(scratch.rms.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn store_fft_zero_fills_short_input() {
        let mut scratch = ScratchBuffers::new(&small_layout());
        scratch.fft_spectrum.fill(9.0);
        scratch.store_fft(&[1.0, 2.0], &[3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(scratch.fft_spectrum, vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(scratch.fft_waveform, vec![3.0, 4.0, 5.0, 6.0]);
    }
}
