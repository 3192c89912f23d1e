//! Decision-trace boundary conditions
//!
//! The trace is an external input and every malformed shape it can take
//! must abort the session with a precise error naming the failing tick.

use std::io::Cursor;

use switchback_core::config::SessionConfig;
use switchback_core::pipeline::{PipelineError, run_sender};
use switchback_core::trace::TraceError;
use switchback_sim::{SimCodec, SyntheticVideo};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 32;

fn config() -> SessionConfig {
    SessionConfig {
        width: WIDTH,
        height: HEIGHT,
        quantizers: vec![16, 48],
    }
}

fn send(frames: usize, trace: &str) -> Result<(), PipelineError> {
    let raw = SyntheticVideo::new(WIDTH, HEIGHT, 1).frames(frames).1;
    let mut compressed = Vec::new();
    run_sender(
        &SimCodec,
        &config(),
        Cursor::new(raw),
        Cursor::new(trace.to_string()),
        &mut compressed,
    )
    .map(|_| ())
}

#[test]
fn exhausted_trace_names_the_starving_tick() {
    let err = send(4, "0 1 0").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Trace(TraceError::Exhausted { tick: 3 })
    ));
}

#[test]
fn non_numeric_entry_is_rejected() {
    let err = send(3, "0 high 0").unwrap_err();
    match err {
        PipelineError::Trace(TraceError::InvalidEntry { tick, entry, .. }) => {
            assert_eq!(tick, 1);
            assert_eq!(entry, "high");
        }
        other => panic!("expected invalid entry, got {other:?}"),
    }
}

#[test]
fn out_of_range_entry_is_rejected() {
    // Rung 2 does not exist on a two-rung ladder.
    let err = send(2, "0 2").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Trace(TraceError::InvalidEntry { tick: 1, .. })
    ));
}

#[test]
fn negative_entry_is_rejected() {
    let err = send(1, "-1").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Trace(TraceError::InvalidEntry { tick: 0, .. })
    ));
}

#[test]
fn arbitrary_whitespace_between_entries_is_accepted() {
    assert!(send(4, "0\n1\t 0\n\n1 ").is_ok());
}

#[test]
fn surplus_trace_entries_are_ignored() {
    // The session ends with the video; leftover selections are fine.
    assert!(send(2, "0 1 0 1 0 1 0 1").is_ok());
}
