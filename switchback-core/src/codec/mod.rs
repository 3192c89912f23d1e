//! Codec engine abstraction.
//!
//! The actual compression work (entropy coding, prediction, quantization
//! internals) is delegated to an opaque engine behind these traits. Every
//! encoder and decoder instance is stateful with respect to the previous
//! call on the same instance: it carries an internal reference picture
//! derived from the last frame it produced or consumed. That statefulness
//! is the entire reason the resynchronizer exists.
//!
//! The system is configured for strict one-frame-in/one-frame-out
//! operation (no B-frames, no lookahead). An encoder producing zero or
//! multiple packets for one valid input frame is a fatal misconfiguration.
//! A decoder is allowed to report "no output yet" while it buffers; that
//! is a non-error transient resolved by the caller.

use bytes::Bytes;

use crate::raster::Raster;

#[cfg(feature = "ffmpeg")]
pub mod h264;

/// Errors reported by codec engine collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Engine or context could not be created; the session never starts.
    #[error("codec open failure: {reason}")]
    OpenFailure { reason: String },

    /// An encode/decode call failed mid-session.
    #[error("codec failure during {operation}: {reason}")]
    Runtime {
        operation: &'static str,
        reason: String,
    },

    /// Encoder produced no packet for a valid input frame.
    #[error("encoder produced no output for a valid frame")]
    NoOutput,

    /// More than one output record for one input call; the engine is
    /// misconfigured for this strict one-in/one-out system.
    #[error("protocol violation: {packets} packets produced for one frame")]
    ProtocolViolation { packets: usize },
}

/// A compressed frame between encode and decode/transmit.
#[derive(Debug, Clone)]
pub struct CompressedFrame {
    /// Encoded bitstream for exactly one picture.
    pub data: Bytes,
    /// Quantizer of the rung that produced it.
    pub quantizer: u32,
}

impl CompressedFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One stateful encoder instance.
///
/// `encode` must return exactly one compressed frame per input raster;
/// the instance's internal reference advances as a side effect.
pub trait FrameEncoder {
    /// # Errors
    /// - `CodecError::Runtime` - engine call failed
    /// - `CodecError::NoOutput` - no packet for a valid frame
    /// - `CodecError::ProtocolViolation` - more than one packet
    fn encode(&mut self, raster: &Raster) -> Result<CompressedFrame, CodecError>;

    /// Quantizer this instance was opened with.
    fn quantizer(&self) -> u32;
}

/// One stateful decoder instance.
///
/// `Ok(None)` means the decoder is still buffering and has no picture for
/// this call; it is not an error.
pub trait FrameDecoder {
    /// # Errors
    /// - `CodecError::Runtime` - engine call failed
    fn decode(&mut self, frame: &CompressedFrame) -> Result<Option<Raster>, CodecError>;
}

/// Factory for encoder/decoder instances of one codec engine.
///
/// Mirrors the external collaborator surface: `open` per instance, RAII
/// release on drop. Engines must be deterministic: two instances opened
/// with identical parameters and fed identical call sequences produce
/// identical bytes, which is what lets the receiver re-derive the
/// sender's fixup frames from its own reconstructed pictures.
pub trait CodecEngine {
    /// # Errors
    /// - `CodecError::OpenFailure` - context creation failed
    fn open_encoder(
        &self,
        width: u32,
        height: u32,
        quantizer: u32,
    ) -> Result<Box<dyn FrameEncoder>, CodecError>;

    /// # Errors
    /// - `CodecError::OpenFailure` - context creation failed
    fn open_decoder(&self, width: u32, height: u32) -> Result<Box<dyn FrameDecoder>, CodecError>;

    /// Short engine name for logs and reports.
    fn name(&self) -> &'static str;
}


#[cfg(test)]
mod tests {
    use super::stub::{StubEngine, TAG_KEY, TAG_PREDICTED};
    use super::*;

    #[test]
    fn stub_tags_first_frame_as_key() {
        let engine = StubEngine;
        let mut encoder = engine.open_encoder(16, 16, 16).unwrap();
        let raster = Raster::black(16, 16).unwrap();

        let first = encoder.encode(&raster).unwrap();
        let second = encoder.encode(&raster).unwrap();
        assert_eq!(first.data[0], TAG_KEY);
        assert_eq!(second.data[0], TAG_PREDICTED);
        assert_eq!(first.quantizer, 16);
    }

    #[test]
    fn stub_round_trips_pictures() {
        let engine = StubEngine;
        let mut encoder = engine.open_encoder(16, 16, 32).unwrap();
        let mut decoder = engine.open_decoder(16, 16).unwrap();

        let mut raster = Raster::black(16, 16).unwrap();
        raster.as_bytes_mut()[7] = 0xAB;

        let frame = encoder.encode(&raster).unwrap();
        let decoded = decoder.decode(&frame).unwrap().unwrap();
        assert_eq!(decoded, raster);
    }
}
