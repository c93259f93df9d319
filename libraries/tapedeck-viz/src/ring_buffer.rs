//! Lock-free single-producer/single-consumer PCM ring
//!
//! Moves interleaved `f32` frames from the real-time tap to a UI-rate
//! consumer. The producer never blocks: when the consumer falls behind, the
//! producer advances the shared read cursor itself (an overrun) and keeps
//! writing. Counters record lossy conditions; nothing here can fail.
//!
//! Cursors are unbounded `usize` counters compared with `wrapping_sub`.
//! Slot index is `cursor % capacity`. Samples live in `AtomicU32` cells as
//! `f32` bit patterns so the whole channel is safe Rust.
//!
//! # Example
//!
//! ```rust
//! use tapedeck_viz::RingBuffer;
//!
//! let (producer, mut consumer) = RingBuffer::new(8, 2);
//! producer.write(&[0.1, 0.2, 0.3, 0.4], 2);
//!
//! let mut out = [0.0f32; 4];
//! assert_eq!(consumer.read(&mut out, 2), 2);
//! assert_eq!(out, [0.1, 0.2, 0.3, 0.4]);
//! ```

use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lossy-condition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingTelemetry {
    /// Reads that found the ring empty
    pub underruns: u64,
    /// Writes that had to discard unread frames
    pub overruns: u64,
}

/// Shared ring state
///
/// Construct with [`RingBuffer::new`], which hands out the only producer and
/// the only consumer. Neither handle is `Clone`.
#[derive(Debug)]
pub struct RingBuffer {
    cells: Box<[AtomicU32]>,
    channels: AtomicUsize,
    write: AtomicUsize,
    read: AtomicUsize,
    generation: AtomicU64,
    underruns: AtomicU64,
    overruns: AtomicU64,
}

impl RingBuffer {
    /// Allocate a ring of `capacity_frames × channels` samples
    ///
    /// Zero arguments are raised to one.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity_frames: usize, channels: usize) -> (RingProducer, RingConsumer) {
        let channels = channels.max(1);
        let len = capacity_frames.max(1) * channels;
        let cells: Box<[AtomicU32]> = (0..len).map(|_| AtomicU32::new(0)).collect();

        let shared = Arc::new(Self {
            cells,
            channels: AtomicUsize::new(channels),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        });

        (
            RingProducer {
                shared: Arc::clone(&shared),
            },
            RingConsumer { shared },
        )
    }

    fn channels(&self) -> usize {
        self.channels.load(Ordering::Acquire)
    }

    fn capacity_frames(&self, channels: usize) -> usize {
        self.cells.len() / channels
    }

    fn available(&self) -> usize {
        let channels = self.channels();
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write
            .wrapping_sub(read)
            .min(self.capacity_frames(channels))
    }

    fn telemetry(&self) -> RingTelemetry {
        RingTelemetry {
            underruns: self.underruns.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    fn store(&self, index: usize, value: f32) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed);
    }

    fn load(&self, index: usize) -> f32 {
        f32::from_bits(self.cells[index].load(Ordering::Relaxed))
    }
}

/// Writing half, owned by the real-time tap
#[derive(Debug)]
pub struct RingProducer {
    shared: Arc<RingBuffer>,
}

impl RingProducer {
    /// Write `frame_count` interleaved frames from `samples`
    ///
    /// Never blocks. If the ring lacks room the read cursor is pushed forward
    /// by the overflow and the overrun counter is bumped. When more than
    /// `capacity` frames are offered only the newest `capacity` are stored.
    /// Returns the number of frames stored.
    pub fn write(&self, samples: &[f32], frame_count: usize) -> usize {
        let ring = &*self.shared;
        let channels = ring.channels();
        let capacity = ring.capacity_frames(channels);
        let frame_count = frame_count.min(samples.len() / channels);
        if frame_count == 0 {
            return 0;
        }

        let write = ring.write.load(Ordering::Relaxed);
        let read = ring.read.load(Ordering::Acquire);
        let used = write.wrapping_sub(read).min(capacity);
        let new_write = write.wrapping_add(frame_count);

        if used + frame_count > capacity {
            let min_read = new_write.wrapping_sub(capacity);
            Self::advance_read(ring, min_read);
            ring.overruns.fetch_add(1, Ordering::Relaxed);
            // Orders the cursor move before the slot overwrites below.
            fence(Ordering::Release);
        }

        let stored = frame_count.min(capacity);
        let skipped = frame_count - stored;
        let first_frame = write.wrapping_add(skipped);
        let source = &samples[skipped * channels..frame_count * channels];

        for (offset, frame) in source.chunks_exact(channels).enumerate() {
            let slot = first_frame.wrapping_add(offset) % capacity;
            let base = slot * channels;
            for (channel, &sample) in frame.iter().enumerate() {
                ring.store(base + channel, sample);
            }
        }

        ring.write.store(new_write, Ordering::Release);
        stored
    }

    // Monotonic max in wrapping cursor space.
    fn advance_read(ring: &RingBuffer, target: usize) {
        let mut current = ring.read.load(Ordering::Acquire);
        loop {
            if (target.wrapping_sub(current) as isize) <= 0 {
                return;
            }
            match ring.read.compare_exchange_weak(
                current,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Discard everything unread
    ///
    /// With `new_generation` the generation counter is bumped so consumers
    /// can tell the stream format changed.
    pub fn flush(&self, new_generation: bool) {
        let ring = &*self.shared;
        let write = ring.write.load(Ordering::Relaxed);
        Self::advance_read(ring, write);
        if new_generation {
            ring.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Switch the interleave width, flushing into a new generation
    ///
    /// Frame capacity becomes `allocated samples / channels`. Returns false
    /// (and changes nothing) when `channels` is zero or exceeds the storage.
    pub fn reformat(&self, channels: usize) -> bool {
        let ring = &*self.shared;
        if channels == 0 || channels > ring.cells.len() {
            return false;
        }
        if channels == ring.channels() {
            return true;
        }
        self.flush(false);
        ring.channels.store(channels, Ordering::Release);
        ring.generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Frames currently readable
    pub fn available_frames(&self) -> usize {
        self.shared.available()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Lossy-condition counters
    pub fn telemetry(&self) -> RingTelemetry {
        self.shared.telemetry()
    }
}

/// Reading half, owned by the UI-rate consumer
#[derive(Debug)]
pub struct RingConsumer {
    shared: Arc<RingBuffer>,
}

impl RingConsumer {
    /// Copy up to `frame_count` interleaved frames into `dest`
    ///
    /// An empty ring bumps the underrun counter and returns 0 so the caller
    /// can fill silence. If the producer lapped this reader during the copy
    /// the copy is discarded and 0 is returned.
    pub fn read(&mut self, dest: &mut [f32], frame_count: usize) -> usize {
        let ring = &*self.shared;
        let generation = ring.generation.load(Ordering::Acquire);
        let channels = ring.channels();
        let capacity = ring.capacity_frames(channels);

        let read = ring.read.load(Ordering::Acquire);
        let write = ring.write.load(Ordering::Acquire);
        if write == read {
            ring.underruns.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        let available = write.wrapping_sub(read).min(capacity);
        let frames = frame_count.min(available).min(dest.len() / channels);
        if frames == 0 {
            return 0;
        }

        // Two contiguous segments: up to the end of storage, then from slot 0.
        let start = read % capacity;
        let first = frames.min(capacity - start);
        let second = frames - first;
        Self::copy_segment(ring, start * channels, &mut dest[..first * channels]);
        Self::copy_segment(
            ring,
            0,
            &mut dest[first * channels..(first + second) * channels],
        );

        fence(Ordering::Acquire);
        if ring.generation.load(Ordering::Acquire) != generation {
            return 0;
        }
        match ring.read.compare_exchange(
            read,
            read.wrapping_add(frames),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => frames,
            Err(_) => 0,
        }
    }

    fn copy_segment(ring: &RingBuffer, start: usize, dest: &mut [f32]) {
        for (offset, slot) in dest.iter_mut().enumerate() {
            *slot = ring.load(start + offset);
        }
    }

    /// Frames currently readable
    pub fn available_frames(&self) -> usize {
        self.shared.available()
    }

    /// Interleave width of the frames currently in the ring
    pub fn channels(&self) -> usize {
        self.shared.channels()
    }

    /// Current frame capacity
    pub fn capacity_frames(&self) -> usize {
        self.shared.capacity_frames(self.shared.channels())
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Lossy-condition counters
    pub fn telemetry(&self) -> RingTelemetry {
        self.shared.telemetry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize, start: f32) -> Vec<f32> {
        (0..frames * channels).map(|i| start + i as f32).collect()
    }

    #[test]
    fn read_of_empty_ring_counts_underrun() {
        let (_producer, mut consumer) = RingBuffer::new(16, 2);
        let mut out = [0.0f32; 8];
        assert_eq!(consumer.read(&mut out, 4), 0);
        assert_eq!(consumer.read(&mut out, 4), 0);
        assert_eq!(consumer.telemetry().underruns, 2);
        assert_eq!(consumer.telemetry().overruns, 0);
    }

    #[test]
    fn wrapped_read_returns_samples_in_order() {
        let (producer, mut consumer) = RingBuffer::new(4, 1);
        let mut out = [0.0f32; 4];

        producer.write(&[1.0, 2.0, 3.0], 3);
        assert_eq!(consumer.read(&mut out, 3), 3);

        producer.write(&[4.0, 5.0, 6.0], 3);
        assert_eq!(consumer.read(&mut out, 3), 3);
        assert_eq!(&out[..3], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn overrun_advances_read_cursor_by_overflow() {
        let (producer, mut consumer) = RingBuffer::new(4, 1);
        producer.write(&[1.0, 2.0, 3.0], 3);
        producer.write(&[4.0, 5.0, 6.0], 3);

        assert_eq!(consumer.available_frames(), 4);
        assert_eq!(consumer.telemetry().overruns, 1);

        let mut out = [0.0f32; 4];
        assert_eq!(consumer.read(&mut out, 4), 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversized_write_keeps_newest_frames() {
        let (producer, mut consumer) = RingBuffer::new(4, 2);
        let samples = ramp(6, 2, 0.0);
        assert_eq!(producer.write(&samples, 6), 4);

        let mut out = [0.0f32; 8];
        assert_eq!(consumer.read(&mut out, 8), 4);
        assert_eq!(&out[..], &samples[4..]);
    }

    #[test]
    fn write_is_limited_by_sample_slice() {
        let (producer, consumer) = RingBuffer::new(8, 2);
        assert_eq!(producer.write(&[0.5; 3], 4), 1);
        assert_eq!(consumer.available_frames(), 1);
    }

    #[test]
    fn flush_discards_and_bumps_generation() {
        let (producer, mut consumer) = RingBuffer::new(8, 1);
        producer.write(&[1.0, 2.0], 2);
        producer.flush(true);

        assert_eq!(consumer.available_frames(), 0);
        assert_eq!(consumer.generation(), 1);

        producer.flush(false);
        assert_eq!(producer.generation(), 1);

        let mut out = [0.0f32; 2];
        assert_eq!(consumer.read(&mut out, 2), 0);
    }

    #[test]
    fn reformat_changes_frame_capacity() {
        let (producer, consumer) = RingBuffer::new(8, 2);
        assert_eq!(consumer.capacity_frames(), 8);

        assert!(producer.reformat(1));
        assert_eq!(consumer.channels(), 1);
        assert_eq!(consumer.capacity_frames(), 16);
        assert_eq!(consumer.generation(), 1);

        assert!(!producer.reformat(0));
        assert!(!producer.reformat(17));
    }

    #[test]
    fn producer_and_consumer_on_separate_threads() {
        let (producer, mut consumer) = RingBuffer::new(64, 2);
        let writer = std::thread::spawn(move || {
            let block = [0.25f32; 32];
            for _ in 0..500 {
                producer.write(&block, 16);
            }
            producer
        });

        let mut out = [0.0f32; 64];
        let mut total = 0;
        for _ in 0..500 {
            let frames = consumer.read(&mut out, 32);
            assert!(out[..frames * 2].iter().all(|&s| s == 0.25));
            total += frames;
        }
        let producer = writer.join().unwrap();
        assert!(total <= 500 * 16);
        assert!(producer.available_frames() <= 64);
    }
}
