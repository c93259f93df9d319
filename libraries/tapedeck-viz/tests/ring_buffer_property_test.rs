//! Property-based tests for the PCM ring
//!
//! A `VecDeque` model that drops its oldest frames on overflow is run
//! alongside the ring for random write/read sequences.

use proptest::prelude::*;
use std::collections::VecDeque;
use tapedeck_viz::RingBuffer;

// ===== Helpers =====

#[derive(Debug, Clone)]
enum Op {
    Write(usize),
    Read(usize),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..40).prop_map(Op::Write),
        (1usize..40).prop_map(Op::Read),
    ]
}

fn frames(start: u32, count: usize, channels: usize) -> Vec<f32> {
    (0..count * channels)
        .map(|i| (start as usize * channels + i) as f32)
        .collect()
}

// ===== Property Tests =====

proptest! {
    /// Property: the ring behaves like a bounded queue that favours the producer
    #[test]
    fn ring_matches_bounded_queue_model(
        capacity in 1usize..32,
        channels in 1usize..4,
        ops in prop::collection::vec(arbitrary_op(), 1..60)
    ) {
        let (producer, mut consumer) = RingBuffer::new(capacity, channels);
        let mut model: VecDeque<Vec<f32>> = VecDeque::new();
        let mut next_frame = 0u32;
        let mut expected_overruns = 0u64;
        let mut expected_underruns = 0u64;

        for op in ops {
            match op {
                Op::Write(count) => {
                    let samples = frames(next_frame, count, channels);
                    next_frame += count as u32;

                    if model.len() + count > capacity {
                        expected_overruns += 1;
                    }
                    for frame in samples.chunks_exact(channels) {
                        model.push_back(frame.to_vec());
                        if model.len() > capacity {
                            model.pop_front();
                        }
                    }

                    let stored = producer.write(&samples, count);
                    prop_assert_eq!(stored, count.min(capacity));
                }
                Op::Read(count) => {
                    let mut dest = vec![0.0f32; count * channels];
                    let read = consumer.read(&mut dest, count);

                    if model.is_empty() {
                        expected_underruns += 1;
                        prop_assert_eq!(read, 0);
                    } else {
                        prop_assert_eq!(read, count.min(model.len()));
                        for frame in dest[..read * channels].chunks_exact(channels) {
                            let expected = model.pop_front().unwrap();
                            prop_assert_eq!(frame, &expected[..]);
                        }
                    }
                }
            }

            prop_assert_eq!(consumer.available_frames(), model.len());
            prop_assert!(consumer.available_frames() <= capacity);
        }

        let telemetry = consumer.telemetry();
        prop_assert_eq!(telemetry.overruns, expected_overruns);
        prop_assert_eq!(telemetry.underruns, expected_underruns);
    }

    /// Property: after N written and M read frames (no overflow) N - M remain
    #[test]
    fn available_is_written_minus_read(
        written in 0usize..64,
        read_fraction in 0.0f64..=1.0
    ) {
        let (producer, mut consumer) = RingBuffer::new(64, 2);
        producer.write(&frames(0, written, 2), written);

        let to_read = (written as f64 * read_fraction) as usize;
        let mut dest = vec![0.0f32; to_read * 2];
        let read = if to_read == 0 { 0 } else { consumer.read(&mut dest, to_read) };

        prop_assert_eq!(read, to_read);
        prop_assert_eq!(consumer.available_frames(), written - to_read);
    }

    /// Property: an unwrapped write/read pair round-trips exactly
    #[test]
    fn single_write_read_round_trips(
        samples in prop::collection::vec(-1.0f32..1.0, 2..128)
    ) {
        let channels = 2;
        let count = samples.len() / channels;
        let (producer, mut consumer) = RingBuffer::new(64, channels);
        producer.write(&samples, count);

        let mut dest = vec![0.0f32; count * channels];
        let read = consumer.read(&mut dest, count);
        prop_assert_eq!(read, count);
        prop_assert_eq!(&dest[..], &samples[..count * channels]);
    }

    /// Property: an overflowing write advances the read cursor by the overflow
    #[test]
    fn overflow_advances_read_by_overflow_amount(
        capacity in 1usize..32,
        first in 0usize..32,
        second in 1usize..64
    ) {
        let first = first.min(capacity);
        let (producer, mut consumer) = RingBuffer::new(capacity, 1);
        producer.write(&frames(0, first, 1), first);
        producer.write(&frames(first as u32, second, 1), second);

        let total = first + second;
        let kept = total.min(capacity);
        prop_assert_eq!(consumer.available_frames(), kept);

        let mut dest = vec![0.0f32; kept];
        prop_assert_eq!(consumer.read(&mut dest, kept), kept);
        // Oldest surviving frame is the overflow amount into the stream.
        prop_assert_eq!(dest[0], (total - kept) as f32);
    }
}
