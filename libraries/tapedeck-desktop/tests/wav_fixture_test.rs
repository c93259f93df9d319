//! Decoding and tag loading against generated WAV files
//!
//! These tests need no audio device.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tapedeck_desktop::{decode_file, LoftyMetadataLoader};
use tapedeck_playback::MetadataLoader;
use tempfile::TempDir;

// ===== Helpers =====

fn write_sine_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, frames: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let phase = 2.0 * std::f32::consts::PI * 440.0 * t;
        let sample = (phase.sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

// ===== Tests =====

#[test]
fn decodes_full_length_and_format() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "tone.wav", 44_100, 2, 22_050);

    let decoded = decode_file(&path).unwrap();
    assert_eq!(decoded.sample_rate, 44_100);
    assert_eq!(decoded.channels, 2);
    assert_eq!(decoded.frames(), 22_050);

    let peak = decoded.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((0.45..=0.55).contains(&peak), "peak {peak}");
}

#[test]
fn conform_to_device_format() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "mono.wav", 22_050, 1, 22_050);

    let decoded = decode_file(&path).unwrap();
    let conformed = decoded.conform(44_100, 2).unwrap();

    assert_eq!(conformed.channels, 2);
    assert_eq!(conformed.sample_rate, 44_100);
    assert_eq!(conformed.frames(), 44_100);
    for frame in conformed.samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn missing_file_fails_to_decode() {
    assert!(decode_file(Path::new("/nonexistent/tone.wav")).is_err());
}

#[test]
fn garbage_file_fails_to_decode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("noise.wav");
    std::fs::write(&path, b"definitely not a wave file").unwrap();
    assert!(decode_file(&path).is_err());
}

#[test]
fn loader_reports_stream_properties() {
    let dir = TempDir::new().unwrap();
    let path = write_sine_wav(dir.path(), "props.wav", 48_000, 2, 96_000);

    let (metadata, properties) = LoftyMetadataLoader::new().load(&path).unwrap();
    assert!((metadata.duration_secs - 2.0).abs() < 0.05);
    assert!(metadata.title.is_empty());
    assert_eq!(properties.sample_rate_hz, 48_000);
    assert_eq!(properties.channel_count, 2);
}
