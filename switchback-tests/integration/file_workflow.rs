//! File-backed session workflow
//!
//! Runs the pipelines against real files the way the CLI wires them up:
//! buffered readers and writers over a temp directory.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use switchback_core::config::SessionConfig;
use switchback_core::pipeline::{PipelineError, run_receiver, run_sender};
use switchback_sim::{SimCodec, SyntheticVideo};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

fn config(quantizers: Vec<u32>) -> SessionConfig {
    SessionConfig {
        width: WIDTH,
        height: HEIGHT,
        quantizers,
    }
}

#[test]
fn full_session_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("input.raw");
    let trace_path = dir.path().join("decisions.txt");
    let stream_path = dir.path().join("session.switch");
    let out_path = dir.path().join("reconstructed.raw");

    let raw = SyntheticVideo::new(WIDTH, HEIGHT, 77).frames(10).1;
    std::fs::write(&raw_path, &raw).unwrap();
    std::fs::write(&trace_path, "0\n1\n0\n1\n0\n1\n0\n1\n0\n1\n").unwrap();

    // Lossless on both rungs so the round trip is exact.
    let config = config(vec![16, 16]);

    let sender = run_sender(
        &SimCodec,
        &config,
        BufReader::new(File::open(&raw_path).unwrap()),
        BufReader::new(File::open(&trace_path).unwrap()),
        BufWriter::new(File::create(&stream_path).unwrap()),
    )
    .unwrap();
    assert_eq!(sender.ticks, 10);
    assert_eq!(sender.resync.switches, 9);

    let receiver = run_receiver(
        &SimCodec,
        &config,
        BufReader::new(File::open(&stream_path).unwrap()),
        BufWriter::new(File::create(&out_path).unwrap()),
    )
    .unwrap();
    assert_eq!(receiver.ticks, 10);
    assert_eq!(receiver.placeholder_frames, 0);

    let reconstructed = std::fs::read(&out_path).unwrap();
    assert_eq!(reconstructed, raw);

    // The stream carries per-record headers on top of the payload.
    let stream_len = std::fs::metadata(&stream_path).unwrap().len();
    assert_eq!(stream_len, sender.transmitted_bytes + 10 * 16);
}

#[test]
fn truncated_stream_file_aborts_receiver() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("session.switch");
    let out_path = dir.path().join("reconstructed.raw");

    let config = config(vec![16, 48]);
    let raw = SyntheticVideo::new(WIDTH, HEIGHT, 13).frames(3).1;

    let mut compressed = Vec::new();
    run_sender(
        &SimCodec,
        &config,
        std::io::Cursor::new(raw),
        std::io::Cursor::new("0 1 0"),
        &mut compressed,
    )
    .unwrap();
    compressed.truncate(compressed.len() - 4);
    std::fs::write(&stream_path, &compressed).unwrap();

    let err = run_receiver(
        &SimCodec,
        &config,
        BufReader::new(File::open(&stream_path).unwrap()),
        BufWriter::new(File::create(&out_path).unwrap()),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Wire(_)));
}
