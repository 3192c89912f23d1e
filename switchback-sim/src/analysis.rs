//! Raster comparison helpers for simulation verification.

use switchback_core::raster::Raster;

/// Peak signal-to-noise ratio between two rasters in dB, computed over
/// all planes. Identical rasters yield `f64::INFINITY`.
///
/// # Panics
/// Panics if the rasters differ in dimensions; comparisons only make
/// sense within one session.
pub fn psnr(a: &Raster, b: &Raster) -> f64 {
    assert_eq!(a.width(), b.width());
    assert_eq!(a.height(), b.height());

    let squared_error: u64 = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(&x, &y)| {
            let diff = x as i64 - y as i64;
            (diff * diff) as u64
        })
        .sum();

    if squared_error == 0 {
        return f64::INFINITY;
    }
    let mse = squared_error as f64 / a.as_bytes().len() as f64;
    10.0 * (255.0f64 * 255.0 / mse).log10()
}

/// Splits a raw byte stream back into rasters.
///
/// # Panics
/// Panics if the stream length is not a whole number of frames.
pub fn split_raw_stream(stream: &[u8], width: u32, height: u32) -> Vec<Raster> {
    let frame_len = Raster::frame_len(width, height);
    assert_eq!(stream.len() % frame_len, 0, "stream is not frame-aligned");
    stream
        .chunks_exact(frame_len)
        .map(|chunk| Raster::from_vec(width, height, chunk.to_vec()).expect("chunked layout"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rasters_have_infinite_psnr() {
        let a = Raster::black(16, 16).unwrap();
        assert_eq!(psnr(&a, &a.clone()), f64::INFINITY);
    }

    #[test]
    fn psnr_drops_with_distortion() {
        let clean = Raster::black(16, 16).unwrap();

        let mut slight = clean.clone();
        slight.as_bytes_mut()[0] = 4;
        let mut heavy = clean.clone();
        heavy.as_bytes_mut().fill(64);

        let slight_psnr = psnr(&clean, &slight);
        let heavy_psnr = psnr(&clean, &heavy);
        assert!(slight_psnr > heavy_psnr);
        assert!(heavy_psnr > 0.0);
    }

    #[test]
    fn splits_stream_into_frames() {
        let frame_len = Raster::frame_len(16, 16);
        let mut stream = vec![1u8; frame_len];
        stream.extend(vec![2u8; frame_len]);

        let frames = split_raw_stream(&stream, 16, 16);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].as_bytes().iter().all(|&b| b == 1));
        assert!(frames[1].as_bytes().iter().all(|&b| b == 2));
    }
}
