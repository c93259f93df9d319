//! Tapedeck terminal player
//!
//! Configuration loading and small helpers for the `tapedeck` binary.

pub mod config;
mod error;
pub mod meter;
pub mod tracks;

pub use error::{PlayerError, Result};
