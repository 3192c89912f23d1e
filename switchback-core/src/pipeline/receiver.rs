//! Receiver pipeline: compressed records in, raw rasters out.

use std::io::{Read, Write};

use tracing::{debug, info, warn};

use crate::codec::{CodecEngine, CompressedFrame};
use crate::config::SessionConfig;
use crate::ladder::QualityLadder;
use crate::pipeline::PipelineError;
use crate::raster::{Raster, RasterWriter};
use crate::resync::{ResyncStats, Resynchronizer};
use crate::wire;

/// Summary of one receiver session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiverReport {
    /// Records processed.
    pub ticks: u64,
    /// Engine used for the session.
    pub engine: &'static str,
    /// Payload bytes consumed (headers excluded).
    pub received_bytes: u64,
    /// Ticks where the decoder had no picture and the placeholder raster
    /// was emitted instead.
    pub placeholder_frames: u64,
    /// Resynchronization counters.
    pub resync: ResyncStats,
}

/// Runs a full receiver session.
///
/// The receiver only ever sees the transmitted rung, so its bookkeeping
/// is keyed on the *signaled* rung index in each record: when it differs
/// from the previous tick's, the same fixup pass the sender ran realigns
/// the newly signaled rung, fed by the receiver's own last
/// reconstructed raster, which is bit-identical to the sender's ground
/// truth under the protocol invariant.
///
/// # Errors
/// Any [`PipelineError`] aborts the session at the failing tick; rasters
/// already written remain flushed.
pub fn run_receiver<I, O>(
    engine: &dyn CodecEngine,
    config: &SessionConfig,
    mut input: I,
    output: O,
) -> Result<ReceiverReport, PipelineError>
where
    I: Read,
    O: Write,
{
    let mut ladder = QualityLadder::open(engine, config)?;
    let mut resync = Resynchronizer::new(ladder.len());
    let mut rasters = RasterWriter::new(output);

    let mut received_bytes = 0u64;
    let mut placeholder_frames = 0u64;
    let mut previous_signal: Option<usize> = None;
    let mut tick = 0u64;

    while let Some(record) = wire::read_record(&mut input, tick)? {
        let signaled = usize::try_from(record.rung)
            .ok()
            .filter(|&rung| rung < ladder.len())
            .ok_or(PipelineError::UnknownRung {
                tick,
                rung: record.rung,
                rung_count: ladder.len(),
            })?;

        if previous_signal.is_some_and(|previous| previous != signaled) {
            resync.record_switch();
        }

        // Same LIVE/STALE machine as the sender, driven by the signal.
        let fixed_up = resync.prepare(engine, ladder.rung_mut(signaled).expect("validated"))?;

        let quantizer = ladder.rung(signaled).expect("validated").quantizer();
        let frame = CompressedFrame {
            data: record.payload,
            quantizer,
        };
        received_bytes += frame.len() as u64;

        let rung = ladder.rung_mut(signaled).expect("validated");
        match rung.decoder.decode(&frame)? {
            Some(reconstructed) => {
                rasters.write_frame(&reconstructed)?;
                resync.commit(reconstructed);
            }
            None => {
                // Keep outputs frame-aligned with inputs: a documented
                // placeholder, never an uninitialized buffer. Ground
                // truth is not advanced by a picture nobody decoded.
                warn!(tick, rung = signaled, "decoder had no picture, emitting placeholder");
                rasters.write_frame(&Raster::placeholder(config.width, config.height)?)?;
                placeholder_frames += 1;
            }
        }
        ladder.mark_selected(signaled);

        debug!(
            tick,
            rung = signaled,
            bytes = frame.len(),
            fixed_up,
            "reconstructed frame"
        );
        previous_signal = Some(signaled);
        tick += 1;
    }

    rasters.flush()?;

    let report = ReceiverReport {
        ticks: tick,
        engine: engine.name(),
        received_bytes,
        placeholder_frames,
        resync: resync.stats().clone(),
    };
    info!(
        ticks = report.ticks,
        switches = report.resync.switches,
        fixups = report.resync.total_fixups(),
        placeholder_frames,
        "receiver session complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::stub::StubEngine;
    use crate::pipeline::run_sender;

    fn test_config() -> SessionConfig {
        SessionConfig {
            width: 16,
            height: 16,
            quantizers: vec![16, 48],
        }
    }

    fn raw_input(frames: usize) -> Vec<u8> {
        let frame_len = test_config().frame_len();
        (0..frames)
            .flat_map(|i| vec![(i * 3) as u8; frame_len])
            .collect()
    }

    fn send(frames: usize, trace: &str) -> Vec<u8> {
        let mut stream = Vec::new();
        run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(frames)),
            Cursor::new(trace.to_string()),
            &mut stream,
        )
        .unwrap();
        stream
    }

    #[test]
    fn reconstructs_frame_for_every_record() {
        let stream = send(4, "0 1 0 1");
        let mut output = Vec::new();
        let report =
            run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output).unwrap();

        assert_eq!(report.ticks, 4);
        assert_eq!(report.placeholder_frames, 0);
        assert_eq!(output.len(), 4 * test_config().frame_len());
    }

    #[test]
    fn mirrors_sender_switch_bookkeeping() {
        let stream = send(3, "0 1 0");
        let mut output = Vec::new();
        let report =
            run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output).unwrap();

        assert_eq!(report.resync.switches, 2);
        assert_eq!(report.resync.fixups, vec![1, 1]);
    }

    #[test]
    fn lossless_engine_round_trips_exactly() {
        let stream = send(3, "0 1 0");
        let mut output = Vec::new();
        run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output).unwrap();
        assert_eq!(output, raw_input(3));
    }

    #[test]
    fn decoder_without_picture_emits_placeholder_frame() {
        // The stub decoder has no picture for an empty payload; the tick
        // must still produce output so the stream stays frame-aligned.
        let mut stream = Vec::new();
        let frame = CompressedFrame {
            data: bytes::Bytes::new(),
            quantizer: 16,
        };
        wire::write_record(&mut stream, 0, &frame).unwrap();

        let mut output = Vec::new();
        let report =
            run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output).unwrap();

        assert_eq!(report.ticks, 1);
        assert_eq!(report.placeholder_frames, 1);
        assert_eq!(output, Raster::placeholder(16, 16).unwrap().as_bytes());
    }

    #[test]
    fn unknown_rung_aborts() {
        let mut stream = Vec::new();
        let frame = CompressedFrame {
            data: bytes::Bytes::from_static(b"Kjunk"),
            quantizer: 16,
        };
        wire::write_record(&mut stream, 7, &frame).unwrap();

        let mut output = Vec::new();
        let err = run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnknownRung { rung: 7, tick: 0, .. }
        ));
    }

    #[test]
    fn truncated_stream_aborts() {
        let mut stream = send(2, "0 0");
        stream.truncate(stream.len() - 1);

        let mut output = Vec::new();
        let err = run_receiver(&StubEngine, &test_config(), Cursor::new(stream), &mut output)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Wire(_)));
    }
}
