//! Sender pipeline: raw rasters in, compressed records out.

use std::io::{BufRead, Read, Write};

use tracing::{debug, info};

use crate::codec::CodecEngine;
use crate::config::SessionConfig;
use crate::ladder::QualityLadder;
use crate::pipeline::PipelineError;
use crate::raster::RasterReader;
use crate::resync::{ResyncStats, Resynchronizer};
use crate::trace::DecisionTrace;
use crate::wire;

/// Summary of one sender session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SenderReport {
    /// Frames processed.
    pub ticks: u64,
    /// Engine used for the session.
    pub engine: &'static str,
    /// Payload bytes actually transmitted (headers excluded).
    pub transmitted_bytes: u64,
    /// Encoded bytes produced per rung across all ticks, transmitted or
    /// not.
    pub encoded_bytes_per_rung: Vec<u64>,
    /// Resynchronization counters.
    pub resync: ResyncStats,
}

/// Runs a full sender session: per tick, read one raster, pull the trace
/// selection, realign the selected rung if it drifted, encode on every
/// rung, transmit the selected rung's frame, and refresh ground truth
/// from its decode.
///
/// # Errors
/// Any [`PipelineError`] aborts the session at the failing tick; records
/// already written remain flushed.
pub fn run_sender<I, T, O>(
    engine: &dyn CodecEngine,
    config: &SessionConfig,
    input: I,
    trace: T,
    mut output: O,
) -> Result<SenderReport, PipelineError>
where
    I: Read,
    T: BufRead,
    O: Write,
{
    let mut ladder = QualityLadder::open(engine, config)?;
    let mut resync = Resynchronizer::new(ladder.len());
    let mut trace = DecisionTrace::new(trace, ladder.len());
    let mut rasters = RasterReader::new(input, config.width, config.height);

    let mut encoded_bytes_per_rung = vec![0u64; ladder.len()];
    let mut transmitted_bytes = 0u64;
    let mut previous_selection: Option<usize> = None;
    let mut tick = 0u64;

    while let Some(raster) = rasters.read_frame()? {
        let selected = trace.next_selection()?;
        if previous_selection.is_some_and(|previous| previous != selected) {
            resync.record_switch();
        }

        // Fixup strictly precedes the real encode on the selected rung.
        let fixed_up = resync.prepare(engine, ladder.rung_mut(selected).expect("validated"))?;

        // Every rung encodes every tick; the ones that are not selected
        // drift, and that is the resynchronizer's problem to repair later.
        let frames = ladder.encode_all(&raster)?;
        for (rung, frame) in frames.iter().enumerate() {
            encoded_bytes_per_rung[rung] += frame.len() as u64;
        }

        let transmitted = &frames[selected];
        wire::write_record(&mut output, selected, transmitted)?;
        transmitted_bytes += transmitted.len() as u64;

        // The sender mirrors the receiver's decode so both ends agree on
        // the reconstructed picture, tick by tick.
        let rung = ladder.rung_mut(selected).expect("validated");
        let reconstructed = rung
            .decoder
            .decode(transmitted)?
            .ok_or(PipelineError::NoGroundTruth {
                tick,
                rung: selected,
            })?;
        resync.commit(reconstructed);
        ladder.mark_selected(selected);

        debug!(
            tick,
            rung = selected,
            bytes = transmitted.len(),
            fixed_up,
            "transmitted frame"
        );
        previous_selection = Some(selected);
        tick += 1;
    }

    output.flush().map_err(crate::wire::WireError::Io)?;

    let report = SenderReport {
        ticks: tick,
        engine: engine.name(),
        transmitted_bytes,
        encoded_bytes_per_rung,
        resync: resync.stats().clone(),
    };
    info!(
        ticks = report.ticks,
        switches = report.resync.switches,
        fixups = report.resync.total_fixups(),
        transmitted_bytes,
        "sender session complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::stub::StubEngine;

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
            .flat_map(|i| vec![i as u8; frame_len])
            .collect()
    }

    #[test]
    fn constant_trace_never_fixes_up() {
        let mut output = Vec::new();
        let report = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(4)),
            Cursor::new("0 0 0 0"),
            &mut output,
        )
        .unwrap();

        assert_eq!(report.ticks, 4);
        assert_eq!(report.resync.switches, 0);
        assert_eq!(report.resync.total_fixups(), 0);
    }

    #[test]
    fn switching_trace_runs_one_fixup_per_switch() {
        // Trace [0, 1, 0]: tick 0 first selection (no fixup), ticks 1 and
        // 2 each switch to a drifted rung.
        let mut output = Vec::new();
        let report = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(3)),
            Cursor::new("0 1 0"),
            &mut output,
        )
        .unwrap();

        assert_eq!(report.ticks, 3);
        assert_eq!(report.resync.switches, 2);
        assert_eq!(report.resync.fixups, vec![1, 1]);
        assert_eq!(report.resync.total_fixups(), 2);
    }

    #[test]
    fn short_trace_aborts_with_exhausted() {
        let mut output = Vec::new();
        let err = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(3)),
            Cursor::new("0 1"),
            &mut output,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Trace(crate::trace::TraceError::Exhausted { tick: 2 })
        ));
    }

    #[test]
    fn out_of_range_trace_entry_aborts() {
        let mut output = Vec::new();
        let err = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(2)),
            Cursor::new("0 5"),
            &mut output,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Trace(crate::trace::TraceError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn truncated_raster_input_aborts() {
        let mut input = raw_input(1);
        input.extend_from_slice(&[0u8; 10]);

        let mut output = Vec::new();
        let err = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(input),
            Cursor::new("0 0"),
            &mut output,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Raster(_)));
    }

    #[test]
    fn transmits_only_selected_rung_bytes() {
        let mut output = Vec::new();
        let report = run_sender(
            &StubEngine,
            &test_config(),
            Cursor::new(raw_input(2)),
            Cursor::new("0 0"),
            &mut output,
        )
        .unwrap();

        // The stub encodes every rung; only rung 0's frames hit the wire.
        assert_eq!(
            report.encoded_bytes_per_rung[0],
            report.transmitted_bytes
        );
        assert_eq!(
            report.encoded_bytes_per_rung[0],
            report.encoded_bytes_per_rung[1]
        );
    }
}
