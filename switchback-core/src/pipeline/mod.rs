//! Sender and receiver tick loops.
//!
//! Both pipelines are single-threaded and synchronous: every codec call
//! blocks, a tick either completes fully or the session aborts, and tick
//! `t + 1` never starts before tick `t`'s ground truth is finalized.

mod receiver;
mod sender;

pub use receiver::{ReceiverReport, run_receiver};
pub use sender::{SenderReport, run_sender};

use crate::codec::CodecError;
use crate::raster::RasterError;
use crate::resync::ResyncError;
use crate::trace::TraceError;
use crate::wire::WireError;

/// Errors that abort a pipeline session.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Resync(#[from] ResyncError),

    /// The stream signaled a rung this session's ladder does not have.
    #[error("unknown rung {rung} at tick {tick}: ladder has {rung_count} rungs")]
    UnknownRung {
        tick: u64,
        rung: u64,
        rung_count: usize,
    },

    /// The sender could not reconstruct the transmitted frame, so ground
    /// truth for the next tick is unknowable.
    #[error("transmitted frame yielded no picture on rung {rung} at tick {tick}")]
    NoGroundTruth { tick: u64, rung: usize },
}
