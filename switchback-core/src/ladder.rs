//! Quality ladder bookkeeping.
//!
//! The ladder is a fixed, small set of quality rungs. Each rung is bound
//! to one quantizer and owns exactly one encoder instance and one decoder
//! instance of the codec engine. On the sender every rung encodes every
//! tick: skipping a rung's encode is precisely what lets its internal
//! reference drift, which the resynchronizer then has to repair before
//! that rung can be transmitted again.

use crate::codec::{CodecEngine, CodecError, CompressedFrame, FrameDecoder, FrameEncoder};
use crate::config::SessionConfig;
use crate::raster::Raster;

/// Whether a rung's internal reference matches the transmitted chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RungState {
    /// Reference matches the last transmitted, reconstructed picture.
    Live,
    /// Reference has drifted; a fixup pass is required before reuse.
    Stale,
}

/// One quality level: an index, a quantizer, and the codec instances
/// bound to it for the lifetime of the session.
pub struct QualityRung {
    index: usize,
    quantizer: u32,
    width: u32,
    height: u32,
    pub(crate) encoder: Box<dyn FrameEncoder>,
    pub(crate) decoder: Box<dyn FrameDecoder>,
    state: RungState,
}

impl QualityRung {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn quantizer(&self) -> u32 {
        self.quantizer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn state(&self) -> RungState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == RungState::Live
    }

    pub(crate) fn set_state(&mut self, state: RungState) {
        self.state = state;
    }

    /// Replaces this rung's encoder with a fresh instance. Used by the
    /// resynchronizer, whose fixup frames must come from an encoder with
    /// no history.
    pub(crate) fn replace_encoder(&mut self, encoder: Box<dyn FrameEncoder>) {
        self.encoder = encoder;
    }
}

/// All rungs of a session, highest quality first.
pub struct QualityLadder {
    rungs: Vec<QualityRung>,
}

impl QualityLadder {
    /// Opens one encoder/decoder pair per configured quantizer.
    ///
    /// All rungs start `Stale`: nothing has been transmitted yet, so no
    /// reference matches the (empty) transmitted chain. The first
    /// selection of a session goes live without a fixup because there is
    /// no ground truth to realign against.
    ///
    /// # Errors
    /// - `CodecError::OpenFailure` - engine rejected a context
    pub fn open(engine: &dyn CodecEngine, config: &SessionConfig) -> Result<Self, CodecError> {
        let mut rungs = Vec::with_capacity(config.rung_count());
        for (index, &quantizer) in config.quantizers.iter().enumerate() {
            rungs.push(QualityRung {
                index,
                quantizer,
                width: config.width,
                height: config.height,
                encoder: engine.open_encoder(config.width, config.height, quantizer)?,
                decoder: engine.open_decoder(config.width, config.height)?,
                state: RungState::Stale,
            });
        }
        Ok(Self { rungs })
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn rung(&self, index: usize) -> Option<&QualityRung> {
        self.rungs.get(index)
    }

    pub fn rung_mut(&mut self, index: usize) -> Option<&mut QualityRung> {
        self.rungs.get_mut(index)
    }

    /// Encodes the raster on one rung, advancing that rung's state.
    ///
    /// # Errors
    /// - `CodecError::NoOutput` / `CodecError::ProtocolViolation` - the
    ///   engine broke the one-frame-in/one-frame-out contract
    /// - `CodecError::Runtime` - engine call failed
    ///
    /// # Panics
    /// Panics if `index` is out of range; selections are validated by the
    /// trace consumer before they reach the ladder.
    pub fn encode_on_rung(
        &mut self,
        raster: &Raster,
        index: usize,
    ) -> Result<CompressedFrame, CodecError> {
        self.rungs[index].encoder.encode(raster)
    }

    /// Encodes the raster on every rung, returning one frame per rung in
    /// ladder order.
    pub fn encode_all(&mut self, raster: &Raster) -> Result<Vec<CompressedFrame>, CodecError> {
        self.rungs
            .iter_mut()
            .map(|rung| rung.encoder.encode(raster))
            .collect()
    }

    /// Records the tick's transmitted rung: it becomes `Live`, every
    /// other rung becomes `Stale`.
    pub fn mark_selected(&mut self, index: usize) {
        for rung in &mut self.rungs {
            let state = if rung.index == index {
                RungState::Live
            } else {
                RungState::Stale
            };
            rung.set_state(state);
        }
    }

    /// The currently live rung, if any.
    pub fn live_rung(&self) -> Option<&QualityRung> {
        self.rungs.iter().find(|rung| rung.is_live())
    }
}
