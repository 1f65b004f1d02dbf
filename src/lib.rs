//! fxvariants - Randomized Effect Variants for Audio Batches
//!
//! Takes uploaded audio files (or zip archives of them), renders several
//! variants of each through randomly composed effect chains, and packages
//! the results for download.
//!
//! # Architecture
//!
//! - `engine`: mono sample buffers, decoding and encoding
//! - `dsp`: the effect catalog, effect implementations and chain composition
//! - `batch`: job workspaces, archive handling, variant rendering, outputs
//! - `config`: processor settings

pub mod batch;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use error::{FxError, Result};
