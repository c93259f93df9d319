//! Snapshot handoff from the tap to the UI poll loop
//!
//! Last writer wins. The publisher only ever `try_lock`s and drops the frame
//! when the reader holds the lock. The reader takes a blocking lock, copies
//! into its own staging arrays and builds the returned [`VisualFrame`] after
//! the lock is released. All copies of a snapshot happen inside one critical
//! section, so a reader never sees a torn frame.

use crate::scratch::{FrameLayout, ScratchBuffers};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// One published analysis snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct VisualFrame {
    /// RMS bins
    pub rms: Vec<f32>,
    /// Goertzel bars
    pub spectrum: Vec<f32>,
    /// Oscilloscope samples downsampled from the valid mono block
    pub waveform: Vec<f32>,
    /// High-resolution FFT magnitudes
    pub fft_spectrum: Vec<f32>,
    /// Waveform at FFT bin resolution
    pub fft_waveform: Vec<f32>,
    /// Render timestamp of the block in seconds
    pub timestamp: f64,
    /// Publish counter value of this snapshot
    pub generation: u64,
}

#[derive(Debug)]
struct Slot {
    rms: Vec<f32>,
    spectrum: Vec<f32>,
    waveform: Vec<f32>,
    fft_spectrum: Vec<f32>,
    fft_waveform: Vec<f32>,
    timestamp: f64,
    generation: u64,
}

impl Slot {
    fn new(layout: &FrameLayout) -> Self {
        Self {
            rms: vec![0.0; layout.rms_bins],
            spectrum: vec![0.0; layout.spectrum_bars],
            waveform: vec![0.0; layout.waveform_len],
            fft_spectrum: vec![0.0; layout.fft_bins],
            fft_waveform: vec![0.0; layout.fft_bins],
            timestamp: 0.0,
            generation: 0,
        }
    }

    fn copy_from(&mut self, other: &Self) {
        self.rms.copy_from_slice(&other.rms);
        self.spectrum.copy_from_slice(&other.spectrum);
        self.waveform.copy_from_slice(&other.waveform);
        self.fft_spectrum.copy_from_slice(&other.fft_spectrum);
        self.fft_waveform.copy_from_slice(&other.fft_waveform);
        self.timestamp = other.timestamp;
        self.generation = other.generation;
    }
}

/// Constructor for the publisher/reader pair
pub struct SharedFrame;

impl SharedFrame {
    /// Allocate the shared slot and reader staging for `layout`
    #[allow(clippy::new_ret_no_self)]
    pub fn new(layout: &FrameLayout) -> (FramePublisher, FrameReader) {
        let slot = Arc::new(Mutex::new(Slot::new(layout)));
        (
            FramePublisher {
                slot: Arc::clone(&slot),
            },
            FrameReader {
                slot,
                staging: Slot::new(layout),
                last_consumed: 0,
            },
        )
    }
}

/// Writer half, used from the real-time tap
#[derive(Debug)]
pub struct FramePublisher {
    slot: Arc<Mutex<Slot>>,
}

impl FramePublisher {
    /// Publish the analysis in `scratch` without blocking
    ///
    /// Returns false when the reader holds the lock; the frame is dropped.
    pub fn try_publish(&self, scratch: &ScratchBuffers, timestamp: f64) -> bool {
        let mut slot = match self.slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };

        copy_into(&mut slot.rms, &scratch.rms);
        copy_into(&mut slot.spectrum, &scratch.spectrum);
        downsample(&mut slot.waveform, scratch.valid_mono());
        copy_into(&mut slot.fft_spectrum, &scratch.fft_spectrum);
        copy_into(&mut slot.fft_waveform, &scratch.fft_waveform);
        slot.timestamp = timestamp;
        slot.generation = slot.generation.wrapping_add(1);
        true
    }
}

/// Reader half, used from the UI poll loop
#[derive(Debug)]
pub struct FrameReader {
    slot: Arc<Mutex<Slot>>,
    staging: Slot,
    last_consumed: u64,
}

impl FrameReader {
    /// Take the latest snapshot if it has not been consumed yet
    pub fn consume(&mut self) -> Option<VisualFrame> {
        {
            let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.generation == self.last_consumed {
                return None;
            }
            self.staging.copy_from(&slot);
        }
        self.last_consumed = self.staging.generation;

        Some(VisualFrame {
            rms: self.staging.rms.clone(),
            spectrum: self.staging.spectrum.clone(),
            waveform: self.staging.waveform.clone(),
            fft_spectrum: self.staging.fft_spectrum.clone(),
            fft_waveform: self.staging.fft_waveform.clone(),
            timestamp: self.staging.timestamp,
            generation: self.staging.generation,
        })
    }

    /// Generation of the last consumed snapshot (0 before the first)
    pub fn last_consumed(&self) -> u64 {
        self.last_consumed
    }
}

fn copy_into(dest: &mut [f32], src: &[f32]) {
    let n = dest.len().min(src.len());
    dest[..n].copy_from_slice(&src[..n]);
    dest[n..].fill(0.0);
}

// Stride comes from the valid sample count, not the scratch capacity.
fn downsample(dest: &mut [f32], valid: &[f32]) {
    if dest.is_empty() {
        return;
    }
    let stride = (valid.len() / dest.len()).max(1);
    for (index, out) in dest.iter_mut().enumerate() {
        *out = valid.get(index * stride).copied().unwrap_or(0.0);
    }
}
