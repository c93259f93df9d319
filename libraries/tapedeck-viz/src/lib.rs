//! Tapedeck Visualizer
//!
//! Real-time analysis of the playback signal for bar spectrum, oscilloscope
//! and shader-host renderers.
//!
//! This crate provides:
//! - Lock-free SPSC PCM ring (`RingBuffer`)
//! - Pre-allocated per-callback scratch memory (`ScratchBuffers`)
//! - Try-lock snapshot handoff (`SharedFrame`)
//! - Goertzel bar spectrum (`SpectrumEngine`)
//! - Hann-windowed real FFT (`FftEngine`)
//! - Tap lifecycle, smoothing and peak hold (`VisualizerPipeline`)
//!
//! # Threading
//!
//! Everything reachable from [`AudioTap::process`] runs on the render
//! thread and never allocates or blocks. [`VisualizerPipeline`] lives on a
//! UI-rate timer. The ring and the shared frame are the only state touched
//! by both.
//!
//! # Example
//!
//! ```rust
//! use tapedeck_core::VisualizerSettings;
//! use tapedeck_viz::VisualizerPipeline;
//!
//! let pipeline = VisualizerPipeline::new(&VisualizerSettings::default()).unwrap();
//! assert!(!pipeline.is_tap_installed());
//! assert_eq!(pipeline.butterchurn_frame().spectrum_bins.len(), 1024);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod fft;
pub mod pipeline;
pub mod ring_buffer;
pub mod scratch;
pub mod shared_frame;
pub mod spectrum;

pub use error::{Result, VizError};
pub use fft::FftEngine;
pub use pipeline::{AudioTap, ButterchurnFrame, TapHost, VisualizerPipeline};
pub use ring_buffer::{RingBuffer, RingConsumer, RingProducer, RingTelemetry};
pub use scratch::{FrameLayout, ScratchBuffers};
pub use shared_frame::{FramePublisher, FrameReader, SharedFrame, VisualFrame};
pub use spectrum::{GoertzelCoefficient, SpectrumEngine, SpectrumTuning};
