//! DSP Effects Library
//!
//! Mono signal processors behind the [`Effect`] trait, the fixed catalog of
//! randomizable effects, and chain composition.

mod chain;
mod chorus;
mod compressor;
mod delay;
mod distortion;
mod effect;
mod phaser;
mod reverb;

pub use chain::{apply_chain, compose_random_chain, Catalog, EffectChain};
pub use chorus::Chorus;
pub use compressor::{Compressor, CompressorParams};
pub use delay::Delay;
pub use distortion::Distortion;
pub use effect::{Effect, EffectKind, EffectSpec, ParamRange};
pub use phaser::Phaser;
pub use reverb::Reverb;
