//! Switchback Core - quality-switched video delivery with reference
//! resynchronization.
//!
//! A sender keeps a small ladder of quality-ranked encoders over the
//! same raw video, transmits exactly one encoding per frame tick as
//! chosen by an external decision trace, and realigns codec reference
//! state whenever the transmitted quality switches. This crate provides
//! the protocol: raster types, the codec engine seam, quality-ladder and
//! LIVE/STALE bookkeeping, the resynchronizer, the wire format, and the
//! sender/receiver pipelines.

pub mod codec;
pub mod config;
pub mod ladder;
pub mod pipeline;
pub mod raster;
pub mod resync;
pub mod trace;
pub mod tracing_setup;
pub mod wire;

// Re-export main types for convenient access
pub use codec::{CodecEngine, CodecError, CompressedFrame, FrameDecoder, FrameEncoder};
pub use config::{ConfigError, SessionConfig};
pub use ladder::{QualityLadder, QualityRung, RungState};
pub use pipeline::{PipelineError, ReceiverReport, SenderReport, run_receiver, run_sender};
pub use raster::{Raster, RasterError, RasterReader, RasterWriter};
pub use resync::{ResyncError, ResyncStats, Resynchronizer};
pub use trace::{DecisionTrace, TraceError};

/// Errors that can bubble up from any Switchback subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SwitchbackError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwitchbackError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SwitchbackError::Codec(e) => match e {
                CodecError::OpenFailure { reason } => {
                    format!("Could not open codec: {reason}")
                }
                CodecError::ProtocolViolation { .. } => {
                    "Codec is misconfigured for one-frame-in/one-frame-out operation".to_string()
                }
                _ => "Codec error occurred".to_string(),
            },
            SwitchbackError::Trace(TraceError::Exhausted { tick }) => {
                format!("Decision trace too short: ran out at frame {tick}")
            }
            SwitchbackError::Trace(_) => "Decision trace is malformed".to_string(),
            SwitchbackError::Pipeline(_) => "Session aborted mid-stream".to_string(),
            SwitchbackError::Configuration(e) => format!("Invalid configuration: {e}"),
            SwitchbackError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input rather than a runtime
    /// failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SwitchbackError::Configuration(_) | SwitchbackError::Trace(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SwitchbackError>;
