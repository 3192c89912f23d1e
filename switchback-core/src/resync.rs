//! Reference-state resynchronization across quality switches.
//!
//! Only one rung is ever transmitted per tick, so the rungs that were not
//! chosen keep advancing their codec state from pictures that never
//! reached the receiver. Before a drifted rung can be transmitted again,
//! its encoder/decoder pair must be realigned to the picture the receiver
//! actually holds, without sending any extra visible bitstream.
//!
//! The fixup pass: discard the rung's encoder, open a fresh instance at
//! the same quantizer, encode the previous tick's ground truth with it
//! (the fixup frame, never transmitted), and decode that frame on the
//! rung's decoder. A fresh encoder's first frame is self-contained, so
//! the receiver can regenerate the byte-identical fixup frame from its
//! own last reconstructed raster, which is what keeps both ends'
//! reference state converged. The same routine serves both pipelines.

use tracing::{debug, error};

use crate::codec::{CodecEngine, CodecError};
use crate::ladder::{QualityRung, RungState};
use crate::raster::Raster;

/// Errors from the fixup pass. All are fatal for the session: once a
/// fixup fails there is no way to transmit from that rung without a
/// known-divergent reference.
#[derive(Debug, thiserror::Error)]
pub enum ResyncError {
    #[error("fixup pass failed on rung {rung}: {source}")]
    Fixup {
        rung: usize,
        #[source]
        source: CodecError,
    },

    /// The fixup frame decoded to nothing; the rung's reference state is
    /// unknown and must not be transmitted from.
    #[error("fixup frame produced no picture on rung {rung}")]
    NoFixupPicture { rung: usize },
}

/// Per-session resynchronization counters.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResyncStats {
    /// Fixup passes run per rung.
    pub fixups: Vec<u64>,
    /// Ticks whose selection differed from the previous tick's.
    pub switches: u64,
}

impl ResyncStats {
    fn new(rung_count: usize) -> Self {
        Self {
            fixups: vec![0; rung_count],
            switches: 0,
        }
    }

    /// Total fixup passes across all rungs.
    pub fn total_fixups(&self) -> u64 {
        self.fixups.iter().sum()
    }
}

/// Tracks ground truth and drives the per-rung `Live ⇄ Stale` machine.
///
/// Ground truth is the raster a conformant receiver has reconstructed
/// from the transmitted stream alone. It is overwritten exactly once per
/// tick by the real decode result and read (never mutated) by fixup
/// passes.
pub struct Resynchronizer {
    ground_truth: Option<Raster>,
    stats: ResyncStats,
}

impl Resynchronizer {
    pub fn new(rung_count: usize) -> Self {
        Self {
            ground_truth: None,
            stats: ResyncStats::new(rung_count),
        }
    }

    /// Last committed ground truth, absent only before the first tick
    /// completes.
    pub fn ground_truth(&self) -> Option<&Raster> {
        self.ground_truth.as_ref()
    }

    /// Makes `rung` safe to transmit from this tick. Returns `true` when
    /// a fixup pass ran.
    ///
    /// - Already live: nothing to do.
    /// - Stale, no ground truth yet: first tick of the session; the rung
    ///   goes live directly, its fresh instances initialize from the
    ///   first real frame.
    /// - Stale with ground truth: run the fixup pass, then go live.
    ///
    /// # Errors
    /// - `ResyncError::Fixup` / `ResyncError::NoFixupPicture` - fatal,
    ///   the session must abort
    pub fn prepare(
        &mut self,
        engine: &dyn CodecEngine,
        rung: &mut QualityRung,
    ) -> Result<bool, ResyncError> {
        if rung.is_live() {
            return Ok(false);
        }

        let index = rung.index();
        let Some(ground_truth) = self.ground_truth.as_ref() else {
            debug!(rung = index, "first selection, no fixup needed");
            rung.set_state(RungState::Live);
            return Ok(false);
        };

        Self::resync(engine, rung, ground_truth)?;
        rung.set_state(RungState::Live);
        self.stats.fixups[index] += 1;
        Ok(true)
    }

    /// The fixup pass itself: realigns `rung`'s encoder and decoder to
    /// `ground_truth`. Mutates only that rung's codec state; the fixup
    /// frame is discarded. Running it twice against the same ground truth
    /// leaves the same reference state as running it once.
    pub fn resync(
        engine: &dyn CodecEngine,
        rung: &mut QualityRung,
        ground_truth: &Raster,
    ) -> Result<(), ResyncError> {
        let index = rung.index();
        let fixup_error = |source| {
            error!(rung = index, "fixup pass failed");
            ResyncError::Fixup {
                rung: index,
                source,
            }
        };

        let mut encoder = engine
            .open_encoder(rung.width(), rung.height(), rung.quantizer())
            .map_err(fixup_error)?;
        let fixup_frame = encoder.encode(ground_truth).map_err(fixup_error)?;
        rung.replace_encoder(encoder);

        let decoded = rung.decoder.decode(&fixup_frame).map_err(fixup_error)?;
        if decoded.is_none() {
            error!(rung = index, "fixup frame decoded to nothing");
            return Err(ResyncError::NoFixupPicture { rung: index });
        }

        debug!(
            rung = index,
            fixup_bytes = fixup_frame.len(),
            "realigned reference state"
        );
        Ok(())
    }

    /// Commits the tick's reconstructed picture as the new ground truth.
    /// Called exactly once per tick, after the real decode.
    pub fn commit(&mut self, raster: Raster) {
        self.ground_truth = Some(raster);
    }

    /// Records that this tick's selection differed from the last one.
    pub fn record_switch(&mut self) {
        self.stats.switches += 1;
    }

    pub fn stats(&self) -> &ResyncStats {
        &self.stats
    }
}
