//! Whole-file decoding with Symphonia
//!
//! Files are decoded up front into interleaved f32, then conformed to the
//! output device: channels are remixed and the rate converted with rubato.
//! The render callback only ever copies from the conformed buffer.

use crate::error::{DesktopError, Result};
use rubato::{FftFixedIn, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Input frames per resampler chunk
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Interleaved PCM
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Frames per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    /// Remix and resample to the given device format
    pub fn conform(&self, sample_rate: u32, channels: u16) -> Result<DecodedAudio> {
        let remixed = remix(&self.samples, self.channels, channels);
        let samples = resample(&remixed, usize::from(channels), self.sample_rate, sample_rate)?;
        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
        })
    }
}

/// Decode the default track of `path`
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DesktopError::decode(path, e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| DesktopError::decode(path, "no audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DesktopError::decode(path, e))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DesktopError::decode(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(DesktopError::decode(path, e)),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let needed = decoded.capacity() * spec.channels.count();
        if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if sample_rate == 0 || channels == 0 {
        return Err(DesktopError::UnsupportedFormat(format!(
            "{}: unknown sample rate or channel layout",
            path.display()
        )));
    }

    debug!(
        "Decoded {}: {} Hz, {} ch, {} samples",
        path.display(),
        sample_rate,
        channels,
        samples.len()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Convert interleaved audio between channel counts
///
/// Mono is duplicated to every output channel, anything folded down to mono
/// is averaged, and otherwise channels map by index with missing ones
/// repeating the source layout.
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let from = usize::from(from);
    let to = usize::from(to);
    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|c| frame[c % from]));
        }
    }
    out
}

/// Resample interleaved audio with rubato's FFT resampler
///
/// The output is trimmed by the resampler's delay and padded or cut to
/// exactly `frames * to / from` frames.
pub fn resample(samples: &[f32], channels: usize, from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() || channels == 0 {
        return Ok(samples.to_vec());
    }

    let frames = samples.len() / channels;
    let expected = (frames as u64 * u64::from(to) / u64::from(from)) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        from as usize,
        to as usize,
        RESAMPLE_CHUNK_FRAMES,
        2,
        channels,
    )
    .map_err(|e| DesktopError::ResampleError(e.to_string()))?;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|c| samples.iter().skip(c).step_by(channels).copied().collect())
        .collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let append = |output: &mut Vec<Vec<f32>>, chunk: Vec<Vec<f32>>| {
        for (out, chunk) in output.iter_mut().zip(chunk) {
            out.extend(chunk);
        }
    };

    let mut position = 0;
    while position + resampler.input_frames_next() <= frames {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|c| &c[position..position + needed])
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| DesktopError::ResampleError(e.to_string()))?;
        append(&mut output, processed);
        position += needed;
    }

    if position < frames {
        let tail: Vec<&[f32]> = planar.iter().map(|c| &c[position..]).collect();
        let processed = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(|e| DesktopError::ResampleError(e.to_string()))?;
        append(&mut output, processed);
    }

    while output[0].len() < expected + delay {
        let processed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| DesktopError::ResampleError(e.to_string()))?;
        if processed.first().map_or(true, Vec::is_empty) {
            break;
        }
        append(&mut output, processed);
    }

    let mut interleaved = Vec::with_capacity(expected * channels);
    for frame in 0..expected {
        for channel in &output {
            interleaved.push(channel.get(delay + frame).copied().unwrap_or(0.0));
        }
    }
    Ok(interleaved)
}
