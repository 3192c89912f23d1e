//! Deterministic reference codec.
//!
//! A miniature predictive codec with the same state contract as the real
//! engine: every encoder and decoder instance carries a reference
//! picture derived from the previous frame it produced or consumed. A
//! fresh encoder's first frame is a keyframe carrying quantized absolute
//! samples; every later frame carries quantized residuals against the
//! instance's reference. Decoding a frame against the wrong reference
//! corrupts the picture, which is exactly the drift the resynchronizer
//! exists to repair, reproduced here without any real entropy coding.
//!
//! The bitstream is fully deterministic: identical instance histories
//! produce identical bytes. Residuals are zero-run-length coded, so the
//! payload shrinks as the quantizer (and with it the step size) grows.

use bytes::Bytes;
use switchback_core::codec::{
    CodecEngine, CodecError, CompressedFrame, FrameDecoder, FrameEncoder,
};
use switchback_core::raster::Raster;

/// Keyframe marker: samples are quantized absolute values.
const FRAME_KEY: u8 = b'K';
/// Predicted-frame marker: samples are quantized residuals.
const FRAME_PREDICTED: u8 = b'P';

/// Zero-run block: `[TAG_ZEROS, count: u16]`.
const TAG_ZEROS: u8 = 0x00;
/// Literal block: `[TAG_LITERALS, count: u16, count * i16]`.
const TAG_LITERALS: u8 = 0x01;

/// Quantization step for a quantizer value: step 1 (lossless) at q=16,
/// step 3 at q=48.
fn step_for(quantizer: u32) -> i16 {
    ((quantizer / 16).clamp(1, 8)) as i16
}

/// Deterministic predictive codec engine for simulation and tests.
pub struct SimCodec;

impl CodecEngine for SimCodec {
    fn open_encoder(
        &self,
        width: u32,
        height: u32,
        quantizer: u32,
    ) -> Result<Box<dyn FrameEncoder>, CodecError> {
        if quantizer == 0 {
            return Err(CodecError::OpenFailure {
                reason: "quantizer must be nonzero".to_string(),
            });
        }
        tracing::debug!(width, height, quantizer, step = step_for(quantizer), "opened sim encoder");
        Ok(Box::new(SimEncoder {
            width,
            height,
            quantizer,
            step: step_for(quantizer),
            reference: None,
        }))
    }

    fn open_decoder(&self, width: u32, height: u32) -> Result<Box<dyn FrameDecoder>, CodecError> {
        Ok(Box::new(SimDecoder {
            width,
            height,
            reference: vec![0; Raster::frame_len(width, height)],
        }))
    }

    fn name(&self) -> &'static str {
        "sim"
    }
}

struct SimEncoder {
    width: u32,
    height: u32,
    quantizer: u32,
    step: i16,
    /// Reconstruction of the last frame this instance emitted; `None`
    /// until the keyframe is out.
    reference: Option<Vec<u8>>,
}

impl FrameEncoder for SimEncoder {
    fn encode(&mut self, raster: &Raster) -> Result<CompressedFrame, CodecError> {
        let input = raster.as_bytes();
        let expected = Raster::frame_len(self.width, self.height);
        if input.len() != expected {
            return Err(CodecError::Runtime {
                operation: "sim encode",
                reason: format!("raster is {} bytes, expected {expected}", input.len()),
            });
        }

        let (frame_type, samples, reconstruction) = match self.reference.as_deref() {
            None => {
                // Keyframe: quantized absolute samples, self-contained.
                let mut samples = Vec::with_capacity(input.len());
                let mut reconstruction = Vec::with_capacity(input.len());
                for &value in input {
                    let quantized = (value as i16 / self.step) * self.step;
                    samples.push(quantized);
                    reconstruction.push(quantized as u8);
                }
                (FRAME_KEY, samples, reconstruction)
            }
            Some(reference) => {
                let mut samples = Vec::with_capacity(input.len());
                let mut reconstruction = Vec::with_capacity(input.len());
                for (&value, &previous) in input.iter().zip(reference) {
                    let residual = value as i16 - previous as i16;
                    let quantized = residual / self.step;
                    samples.push(quantized);
                    // Truncation keeps the step between reference and
                    // input, so no clamp is needed on this side.
                    reconstruction.push((previous as i16 + quantized * self.step) as u8);
                }
                (FRAME_PREDICTED, samples, reconstruction)
            }
        };

        let data = serialize(frame_type, self.step, &samples);
        self.reference = Some(reconstruction);
        Ok(CompressedFrame {
            data,
            quantizer: self.quantizer,
        })
    }

    fn quantizer(&self) -> u32 {
        self.quantizer
    }
}

struct SimDecoder {
    width: u32,
    height: u32,
    /// Last reconstructed picture; zeroed until the first decode.
    reference: Vec<u8>,
}

impl FrameDecoder for SimDecoder {
    fn decode(&mut self, frame: &CompressedFrame) -> Result<Option<Raster>, CodecError> {
        let expected = Raster::frame_len(self.width, self.height);
        let (frame_type, step, samples) = deserialize(&frame.data, expected)?;

        let mut reconstruction = Vec::with_capacity(expected);
        match frame_type {
            FRAME_KEY => {
                for &sample in &samples {
                    reconstruction.push(sample.clamp(0, 255) as u8);
                }
            }
            FRAME_PREDICTED => {
                for (&sample, &previous) in samples.iter().zip(&self.reference) {
                    // A drifted reference can push this out of range;
                    // clamp like any real decoder would.
                    let value = (previous as i16 + sample * step).clamp(0, 255);
                    reconstruction.push(value as u8);
                }
            }
            other => {
                return Err(CodecError::Runtime {
                    operation: "sim decode",
                    reason: format!("unknown frame type 0x{other:02X}"),
                });
            }
        }

        self.reference.copy_from_slice(&reconstruction);
        let raster = Raster::from_vec(self.width, self.height, reconstruction).map_err(|e| {
            CodecError::Runtime {
                operation: "sim decode",
                reason: e.to_string(),
            }
        })?;
        Ok(Some(raster))
    }
}

fn serialize(frame_type: u8, step: i16, samples: &[i16]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() / 4 + 8);
    out.push(frame_type);
    out.push(step as u8);

    let mut index = 0;
    while index < samples.len() {
        if samples[index] == 0 {
            let run_start = index;
            while index < samples.len()
                && samples[index] == 0
                && index - run_start < usize::from(u16::MAX)
            {
                index += 1;
            }
            out.push(TAG_ZEROS);
            out.extend_from_slice(&((index - run_start) as u16).to_le_bytes());
        } else {
            let run_start = index;
            while index < samples.len()
                && samples[index] != 0
                && index - run_start < usize::from(u16::MAX)
            {
                index += 1;
            }
            out.push(TAG_LITERALS);
            out.extend_from_slice(&((index - run_start) as u16).to_le_bytes());
            for &sample in &samples[run_start..index] {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }

    Bytes::from(out)
}

fn deserialize(data: &[u8], expected: usize) -> Result<(u8, i16, Vec<i16>), CodecError> {
    let corrupt = |reason: &str| CodecError::Runtime {
        operation: "sim decode",
        reason: reason.to_string(),
    };

    if data.len() < 2 {
        return Err(corrupt("frame shorter than header"));
    }
    let frame_type = data[0];
    let step = data[1] as i16;
    if step == 0 {
        return Err(corrupt("zero quantization step"));
    }

    let mut samples = Vec::with_capacity(expected);
    let mut cursor = 2;
    while cursor < data.len() {
        let tag = data[cursor];
        let count = data
            .get(cursor + 1..cursor + 3)
            .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
            .ok_or_else(|| corrupt("truncated block header"))?;
        cursor += 3;

        // Reject oversized payloads before materializing their samples.
        if samples.len() + count > expected {
            return Err(corrupt("sample count exceeds frame size"));
        }

        match tag {
            TAG_ZEROS => samples.resize(samples.len() + count, 0),
            TAG_LITERALS => {
                let end = cursor + count * 2;
                let block = data
                    .get(cursor..end)
                    .ok_or_else(|| corrupt("truncated literal block"))?;
                for pair in block.chunks_exact(2) {
                    samples.push(i16::from_le_bytes([pair[0], pair[1]]));
                }
                cursor = end;
            }
            _ => return Err(corrupt("unknown block tag")),
        }
    }

    if samples.len() != expected {
        return Err(corrupt("sample count does not match frame size"));
    }
    Ok((frame_type, step, samples))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const W: u32 = 16;
    const H: u32 = 16;

    fn raster(fill: impl Fn(usize) -> u8) -> Raster {
        let data = (0..Raster::frame_len(W, H)).map(fill).collect();
        Raster::from_vec(W, H, data).unwrap()
    }

    #[test]
    fn step_mapping_matches_canonical_ladder() {
        assert_eq!(step_for(16), 1);
        assert_eq!(step_for(48), 3);
        assert_eq!(step_for(1), 1);
        assert_eq!(step_for(64 * 4), 8);
    }

    #[test]
    fn first_frame_is_a_keyframe() {
        let engine = SimCodec;
        let mut encoder = engine.open_encoder(W, H, 16).unwrap();
        let first = encoder.encode(&raster(|i| i as u8)).unwrap();
        let second = encoder.encode(&raster(|i| i as u8)).unwrap();
        assert_eq!(first.data[0], FRAME_KEY);
        assert_eq!(second.data[0], FRAME_PREDICTED);
    }

    #[test]
    fn identical_histories_produce_identical_bytes() {
        let engine = SimCodec;
        let frames = [raster(|i| i as u8), raster(|i| (i / 3) as u8)];

        let mut first = engine.open_encoder(W, H, 48).unwrap();
        let mut second = engine.open_encoder(W, H, 48).unwrap();
        for frame in &frames {
            assert_eq!(
                first.encode(frame).unwrap().data,
                second.encode(frame).unwrap().data
            );
        }
    }

    #[test]
    fn lossless_at_unit_step() {
        let engine = SimCodec;
        let mut encoder = engine.open_encoder(W, H, 16).unwrap();
        let mut decoder = engine.open_decoder(W, H).unwrap();

        for fill in [7u8, 200, 31] {
            let input = raster(|i| fill.wrapping_add(i as u8));
            let frame = encoder.encode(&input).unwrap();
            let output = decoder.decode(&frame).unwrap().unwrap();
            assert_eq!(output, input);
        }
    }

    #[test]
    fn lossy_step_stays_within_quantizer_tolerance() {
        let engine = SimCodec;
        let mut encoder = engine.open_encoder(W, H, 48).unwrap();
        let mut decoder = engine.open_decoder(W, H).unwrap();

        for frame_index in 0..4u8 {
            let input = raster(|i| (i as u8).wrapping_mul(7).wrapping_add(frame_index));
            let frame = encoder.encode(&input).unwrap();
            let output = decoder.decode(&frame).unwrap().unwrap();
            for (&got, &want) in output.as_bytes().iter().zip(input.as_bytes()) {
                assert!((got as i16 - want as i16).abs() < 3);
            }
        }
    }

    #[test]
    fn decoders_fed_the_same_chain_agree_exactly() {
        let engine = SimCodec;
        let mut encoder = engine.open_encoder(W, H, 48).unwrap();
        let mut left = engine.open_decoder(W, H).unwrap();
        let mut right = engine.open_decoder(W, H).unwrap();

        for n in 0..4u8 {
            let frame = encoder
                .encode(&raster(|i| (i as u8).wrapping_add(n * 17)))
                .unwrap();
            let a = left.decode(&frame).unwrap().unwrap();
            let b = right.decode(&frame).unwrap().unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn missed_frame_corrupts_the_chain() {
        // A decoder that skips one predicted frame decodes the rest
        // against a stale reference: visible drift.
        let engine = SimCodec;
        let mut encoder = engine.open_encoder(W, H, 16).unwrap();
        let mut synced = engine.open_decoder(W, H).unwrap();
        let mut skipping = engine.open_decoder(W, H).unwrap();

        let frames: Vec<_> = (0..3u8)
            .map(|n| {
                encoder
                    .encode(&raster(|i| (i as u8).wrapping_add(n * 40)))
                    .unwrap()
            })
            .collect();

        synced.decode(&frames[0]).unwrap();
        skipping.decode(&frames[0]).unwrap();
        synced.decode(&frames[1]).unwrap();
        // `skipping` never sees frames[1].
        let good = synced.decode(&frames[2]).unwrap().unwrap();
        let bad = skipping.decode(&frames[2]).unwrap().unwrap();
        assert_ne!(good, bad);
    }

    #[test]
    fn keyframe_resets_any_decoder_state() {
        // Self-contained frames realign even a wildly drifted decoder:
        // the property the fixup pass is built on.
        let engine = SimCodec;
        let mut drifted = engine.open_decoder(W, H).unwrap();
        let mut fresh = engine.open_decoder(W, H).unwrap();

        let mut noise_encoder = engine.open_encoder(W, H, 16).unwrap();
        drifted
            .decode(&noise_encoder.encode(&raster(|i| (i * 13) as u8)).unwrap())
            .unwrap();

        let truth = raster(|i| (i / 2) as u8);
        let mut fixup_encoder = engine.open_encoder(W, H, 16).unwrap();
        let fixup = fixup_encoder.encode(&truth).unwrap();

        let from_drifted = drifted.decode(&fixup).unwrap().unwrap();
        let from_fresh = fresh.decode(&fixup).unwrap().unwrap();
        assert_eq!(from_drifted, from_fresh);
        assert_eq!(from_drifted, truth); // unit step: bit-for-bit
    }

    #[test]
    fn coarser_quantizer_produces_smaller_frames() {
        let engine = SimCodec;
        let mut fine = engine.open_encoder(W, H, 16).unwrap();
        let mut coarse = engine.open_encoder(W, H, 48).unwrap();

        // Samples are multiples of the coarse step, so both keyframe
        // references reconstruct the first picture exactly and the +2
        // delta is the whole residual on both encoders.
        let first = raster(|i| ((i % 85) * 3) as u8);
        let second = raster(|i| (((i % 85) * 3) as u8).wrapping_add(2));
        fine.encode(&first).unwrap();
        coarse.encode(&first).unwrap();

        // The delta quantizes to zero at step 3 but survives at step 1.
        let fine_frame = fine.encode(&second).unwrap();
        let coarse_frame = coarse.encode(&second).unwrap();
        assert!(coarse_frame.len() < fine_frame.len());
    }

    proptest! {
        #[test]
        fn unit_step_round_trips_any_content(
            data in prop::collection::vec(any::<u8>(), 384)
        ) {
            let engine = SimCodec;
            let mut encoder = engine.open_encoder(W, H, 16).unwrap();
            let mut decoder = engine.open_decoder(W, H).unwrap();

            let input = Raster::from_vec(W, H, data).unwrap();
            let frame = encoder.encode(&input).unwrap();
            let output = decoder.decode(&frame).unwrap().unwrap();
            prop_assert_eq!(output, input);
        }
    }

    #[test]
    fn rejects_corrupt_payloads() {
        let engine = SimCodec;
        let mut decoder = engine.open_decoder(W, H).unwrap();

        for payload in [&b""[..], &b"K"[..], &b"X\x01\x00\x10\x00"[..]] {
            let frame = CompressedFrame {
                data: Bytes::copy_from_slice(payload),
                quantizer: 16,
            };
            assert!(decoder.decode(&frame).is_err());
        }
    }

    #[test]
    fn rejects_oversized_zero_runs_without_materializing_them() {
        // A tiny corrupt payload of maximal zero-run blocks must fail as
        // soon as the declared sample count passes the frame size, not
        // after expanding every block.
        let engine = SimCodec;
        let mut decoder = engine.open_decoder(W, H).unwrap();

        let mut payload = vec![FRAME_KEY, 1];
        for _ in 0..4 {
            payload.push(TAG_ZEROS);
            payload.extend_from_slice(&u16::MAX.to_le_bytes());
        }
        let frame = CompressedFrame {
            data: Bytes::from(payload),
            quantizer: 16,
        };
        assert!(decoder.decode(&frame).is_err());
    }
}
