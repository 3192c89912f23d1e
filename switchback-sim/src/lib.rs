//! Switchback Sim - deterministic collaborators for simulation and
//! testing.
//!
//! Everything here is reproducible from a seed or from call order alone:
//! a reference predictive codec with real drift semantics, synthetic
//! video content, decision-trace scenarios, and raster analysis helpers.
//! The simulation codec is the default engine for the CLI, so whole
//! sessions run bit-identically across machines.

pub mod analysis;
pub mod codec;
pub mod content;
pub mod scenarios;

pub use analysis::{psnr, split_raw_stream};
pub use codec::SimCodec;
pub use content::SyntheticVideo;
