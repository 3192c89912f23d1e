//! Quality-switching integration tests
//!
//! Exercises the switch-and-fixup protocol across both pipelines: every
//! quality switch onto a drifted rung must trigger exactly one fixup
//! pass on each end, and the two ends must stay picture-aligned through
//! arbitrary switch patterns.

use std::io::Cursor;

use switchback_core::config::SessionConfig;
use switchback_core::pipeline::{run_receiver, run_sender};
use switchback_sim::scenarios::{alternating_trace, constant_trace};
use switchback_sim::{SimCodec, SyntheticVideo, psnr, split_raw_stream};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn config(quantizers: Vec<u32>) -> SessionConfig {
    SessionConfig {
        width: WIDTH,
        height: HEIGHT,
        quantizers,
    }
}

fn synthetic_stream(frames: usize, seed: u64) -> Vec<u8> {
    SyntheticVideo::new(WIDTH, HEIGHT, seed).frames(frames).1
}

fn round_trip(config: &SessionConfig, raw: &[u8], trace: &str) -> (Vec<u8>, Vec<u8>) {
    let mut compressed = Vec::new();
    run_sender(
        &SimCodec,
        config,
        Cursor::new(raw.to_vec()),
        Cursor::new(trace.to_string()),
        &mut compressed,
    )
    .unwrap();

    let mut reconstructed = Vec::new();
    run_receiver(
        &SimCodec,
        config,
        Cursor::new(compressed.clone()),
        &mut reconstructed,
    )
    .unwrap();
    (compressed, reconstructed)
}

#[test]
fn three_frame_switch_scenario_runs_exactly_two_fixups() {
    // Trace [0, 1, 0] over a two-rung ladder: the first selection needs
    // no fixup, each of the two subsequent switches lands on a rung that
    // drifted for exactly one tick.
    let config = config(vec![16, 48]);
    let raw = synthetic_stream(3, 7);

    let mut compressed = Vec::new();
    let sender = run_sender(
        &SimCodec,
        &config,
        Cursor::new(raw),
        Cursor::new("0 1 0"),
        &mut compressed,
    )
    .unwrap();

    assert_eq!(sender.ticks, 3);
    assert_eq!(sender.resync.switches, 2);
    assert_eq!(sender.resync.fixups, vec![1, 1]);
    assert_eq!(sender.resync.total_fixups(), 2);

    let mut reconstructed = Vec::new();
    let receiver = run_receiver(
        &SimCodec,
        &config,
        Cursor::new(compressed),
        &mut reconstructed,
    )
    .unwrap();

    // The receiver runs the identical LIVE/STALE machine off the
    // signaled rung indices alone.
    assert_eq!(receiver.resync.switches, 2);
    assert_eq!(receiver.resync.fixups, vec![1, 1]);
    assert_eq!(receiver.placeholder_frames, 0);
}

#[test]
fn lossless_ladder_survives_switching_bit_for_bit() {
    // Quantizer 16 maps to a quantization step of 1 in the simulation
    // engine, so reconstruction is exact. With both rungs lossless the
    // receiver's output must equal the raw input even across switches,
    // which would be impossible if any fixup left the two ends on
    // different reference state.
    let config = config(vec![16, 16]);
    let raw = synthetic_stream(24, 11);
    let (_, reconstructed) = round_trip(&config, &raw, &alternating_trace(24));

    assert_eq!(reconstructed, raw);
}

#[test]
fn lossy_rung_keeps_quality_through_switches() {
    // With the coarse rung in rotation, the error per sample is bounded
    // by the quantization step. Quality must stay flat from the first
    // switch to the last, not erode tick by tick.
    let config = config(vec![16, 48]);
    let frames = 30;
    let raw = synthetic_stream(frames, 3);
    let (_, reconstructed) = round_trip(&config, &raw, &alternating_trace(frames));

    let inputs = split_raw_stream(&raw, WIDTH, HEIGHT);
    let outputs = split_raw_stream(&reconstructed, WIDTH, HEIGHT);
    assert_eq!(outputs.len(), frames);

    // Lossless-rung ticks reconstruct exactly and score infinite PSNR;
    // cap them so the window averages below stay finite.
    let scores: Vec<f64> = inputs
        .iter()
        .zip(&outputs)
        .map(|(input, output)| psnr(input, output).min(99.0))
        .collect();

    for (tick, score) in scores.iter().enumerate() {
        assert!(
            *score > 35.0,
            "tick {tick} degraded to {score:.1} dB"
        );
    }

    // No drift: the tail of the session is as good as the head.
    let head = scores[1..6].iter().sum::<f64>() / 5.0;
    let tail = scores[frames - 5..].iter().sum::<f64>() / 5.0;
    assert!(
        tail > head - 3.0,
        "quality eroded from {head:.1} dB to {tail:.1} dB"
    );
}

#[test]
fn constant_selection_matches_single_rung_session() {
    // A session that never switches must be byte-identical to a session
    // on a one-rung ladder with the same quantizer: the surrounding
    // ladder machinery adds nothing when no switch happens.
    let raw = synthetic_stream(8, 19);

    let two_rung = config(vec![16, 48]);
    let (_, via_ladder) = round_trip(&two_rung, &raw, &constant_trace(1, 8));

    let single_rung = config(vec![48]);
    let (_, direct) = round_trip(&single_rung, &raw, &constant_trace(0, 8));

    assert_eq!(via_ladder, direct);
}

#[test]
fn three_rung_ladder_switches_cleanly() {
    let config = config(vec![16, 32, 48]);
    let raw = synthetic_stream(9, 23);

    let mut compressed = Vec::new();
    let sender = run_sender(
        &SimCodec,
        &config,
        Cursor::new(raw),
        Cursor::new("0 1 2 0 1 2 2 1 0"),
        &mut compressed,
    )
    .unwrap();

    // Seven transitions, all onto drifted rungs.
    assert_eq!(sender.resync.switches, 7);
    assert_eq!(sender.resync.total_fixups(), 7);

    let mut reconstructed = Vec::new();
    let receiver = run_receiver(
        &SimCodec,
        &config,
        Cursor::new(compressed),
        &mut reconstructed,
    )
    .unwrap();
    assert_eq!(receiver.resync.fixups, sender.resync.fixups);
    assert_eq!(reconstructed.len(), 9 * config.frame_len());
}
