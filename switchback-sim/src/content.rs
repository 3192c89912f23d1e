//! Deterministic synthetic video content.
//!
//! Generates reproducible 4:2:0 frame sequences for simulations and
//! tests: a diagonal gradient that pans across the picture per tick,
//! with seeded noise on top so consecutive frames have nonzero residuals
//! at every quantizer. The same seed always yields the same bytes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use switchback_core::raster::Raster;

/// Peak-to-peak amplitude of the luma noise.
const NOISE_AMPLITUDE: u8 = 8;

/// Seeded generator of synthetic rasters.
pub struct SyntheticVideo {
    width: u32,
    height: u32,
    rng: ChaCha8Rng,
    tick: u64,
}

impl SyntheticVideo {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
        }
    }

    /// Produces the next frame of the sequence.
    pub fn next_frame(&mut self) -> Raster {
        let (width, height) = (self.width as usize, self.height as usize);
        let mut data = Vec::with_capacity(Raster::frame_len(self.width, self.height));
        let pan = (self.tick * 3) as usize;

        for y in 0..height {
            for x in 0..width {
                let gradient = ((x + y + pan) % 256) as u8;
                let noise = self.rng.random_range(0..NOISE_AMPLITUDE);
                data.push(gradient.saturating_add(noise));
            }
        }
        // Chroma planes drift more slowly than luma.
        for _ in 0..height / 2 {
            for x in 0..width / 2 {
                data.push(((x + pan / 2) % 256) as u8);
            }
        }
        for y in 0..height / 2 {
            for x in 0..width / 2 {
                data.push(((y + x / 2 + pan / 4) % 256) as u8);
            }
        }

        self.tick += 1;
        Raster::from_vec(self.width, self.height, data).expect("generated layout is valid")
    }

    /// Generates `count` frames and returns them with their concatenated
    /// raw-stream bytes, ready to feed a sender.
    pub fn frames(&mut self, count: usize) -> (Vec<Raster>, Vec<u8>) {
        let frames: Vec<_> = (0..count).map(|_| self.next_frame()).collect();
        let stream = frames
            .iter()
            .flat_map(|frame| frame.as_bytes().iter().copied())
            .collect();
        (frames, stream)
    }
}
