//! Planar 4:2:0 raster type and raw frame stream I/O.
//!
//! A raster is one decoded picture in the fixed layout the whole system
//! agrees on: a full-resolution luma plane followed by two quarter-size
//! chroma planes. Raw video files are nothing but these rasters
//! back-to-back with no headers.

use std::io::{Read, Write};

/// Errors from raster construction and raw stream I/O.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("invalid raster dimensions {width}x{height}: must be nonzero and even")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("raster buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BadLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("raw stream ended mid-frame: got {actual} of {expected} bytes at frame {frame}")]
    TruncatedFrame {
        frame: u64,
        expected: usize,
        actual: usize,
    },

    #[error("raster I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One raw picture in planar 4:2:0 layout.
///
/// Invariant: `data.len() == width * height * 3 / 2`, with the luma plane
/// first and the two chroma planes after it. Width and height are fixed
/// for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Luma fill for frames the decoder could not produce (white picture).
pub const PLACEHOLDER_LUMA: u8 = 0xFF;
/// Chroma fill for placeholder frames (neutral).
pub const PLACEHOLDER_CHROMA: u8 = 0x80;

impl Raster {
    /// Total byte length of one frame at the given dimensions.
    pub fn frame_len(width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        pixels + pixels / 2
    }

    /// Byte length of the luma plane.
    pub fn luma_len(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }

    /// Creates an all-black raster (zeroed planes).
    pub fn black(width: u32, height: u32) -> Result<Self, RasterError> {
        Self::validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; Self::frame_len(width, height)],
        })
    }

    /// Creates the deterministic placeholder raster emitted when a decoder
    /// yields no picture for a tick: white luma, neutral chroma.
    pub fn placeholder(width: u32, height: u32) -> Result<Self, RasterError> {
        Self::validate_dimensions(width, height)?;
        let luma = Self::luma_len(width, height);
        let mut data = vec![PLACEHOLDER_CHROMA; Self::frame_len(width, height)];
        data[..luma].fill(PLACEHOLDER_LUMA);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wraps an existing buffer, validating the size invariant.
    pub fn from_vec(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RasterError> {
        Self::validate_dimensions(width, height)?;
        let expected = Self::frame_len(width, height);
        if data.len() != expected {
            return Err(RasterError::BadLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    fn validate_dimensions(width: u32, height: u32) -> Result<(), RasterError> {
        // Chroma subsampling needs even dimensions.
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full frame bytes: luma plane, then U, then V.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..Self::luma_len(self.width, self.height)]
    }

    pub fn chroma_u(&self) -> &[u8] {
        let luma = Self::luma_len(self.width, self.height);
        &self.data[luma..luma + luma / 4]
    }

    pub fn chroma_v(&self) -> &[u8] {
        let luma = Self::luma_len(self.width, self.height);
        &self.data[luma + luma / 4..]
    }
}

/// Reads fixed-size rasters from a headerless raw stream until end-of-stream.
pub struct RasterReader<R: Read> {
    inner: R,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl<R: Read> RasterReader<R> {
    pub fn new(inner: R, width: u32, height: u32) -> Self {
        Self {
            inner,
            width,
            height,
            frames_read: 0,
        }
    }

    /// Reads the next frame. `Ok(None)` on clean end-of-stream; a stream
    /// that ends in the middle of a frame is corrupt input, not EOF.
    pub fn read_frame(&mut self) -> Result<Option<Raster>, RasterError> {
        let expected = Raster::frame_len(self.width, self.height);
        let mut buf = vec![0u8; expected];
        let mut filled = 0;

        while filled < expected {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RasterError::Io(e)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < expected {
            return Err(RasterError::TruncatedFrame {
                frame: self.frames_read,
                expected,
                actual: filled,
            });
        }

        self.frames_read += 1;
        Ok(Some(Raster::from_vec(self.width, self.height, buf)?))
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

/// Writes rasters back-to-back to a headerless raw stream.
pub struct RasterWriter<W: Write> {
    inner: W,
    frames_written: u64,
}

impl<W: Write> RasterWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
        }
    }

    pub fn write_frame(&mut self, raster: &Raster) -> Result<(), RasterError> {
        self.inner.write_all(raster.as_bytes())?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RasterError> {
        Ok(self.inner.flush()?)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn frame_len_is_three_halves_of_pixel_count() {
        assert_eq!(Raster::frame_len(1280, 720), 1280 * 720 * 3 / 2);
        assert_eq!(Raster::frame_len(16, 16), 384);
    }

    #[test]
    fn placeholder_is_white_with_neutral_chroma() {
        let raster = Raster::placeholder(16, 16).unwrap();
        assert!(raster.luma().iter().all(|&b| b == PLACEHOLDER_LUMA));
        assert!(raster.chroma_u().iter().all(|&b| b == PLACEHOLDER_CHROMA));
        assert!(raster.chroma_v().iter().all(|&b| b == PLACEHOLDER_CHROMA));
    }

    #[test]
    fn rejects_odd_and_zero_dimensions() {
        assert!(matches!(
            Raster::black(15, 16),
            Err(RasterError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            Raster::black(0, 16),
            Err(RasterError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = Raster::from_vec(16, 16, vec![0; 100]).unwrap_err();
        assert!(matches!(err, RasterError::BadLength { expected: 384, .. }));
    }

    #[test]
    fn chroma_planes_are_quarter_size() {
        let raster = Raster::black(32, 16).unwrap();
        assert_eq!(raster.luma().len(), 512);
        assert_eq!(raster.chroma_u().len(), 128);
        assert_eq!(raster.chroma_v().len(), 128);
    }

    #[test]
    fn reader_round_trips_frames() {
        let frame_a = vec![1u8; Raster::frame_len(16, 16)];
        let frame_b = vec![2u8; Raster::frame_len(16, 16)];
        let mut stream = frame_a.clone();
        stream.extend_from_slice(&frame_b);

        let mut reader = RasterReader::new(Cursor::new(stream), 16, 16);
        assert_eq!(reader.read_frame().unwrap().unwrap().as_bytes(), &frame_a[..]);
        assert_eq!(reader.read_frame().unwrap().unwrap().as_bytes(), &frame_b[..]);
        assert!(reader.read_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 2);
    }

    #[test]
    fn reader_rejects_truncated_final_frame() {
        let stream = vec![7u8; Raster::frame_len(16, 16) + 10];
        let mut reader = RasterReader::new(Cursor::new(stream), 16, 16);
        assert!(reader.read_frame().unwrap().is_some());
        assert!(matches!(
            reader.read_frame(),
            Err(RasterError::TruncatedFrame {
                frame: 1,
                actual: 10,
                ..
            })
        ));
    }
}
