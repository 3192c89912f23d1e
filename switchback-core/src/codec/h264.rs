//! H.264 codec engine backed by libavcodec (`ffmpeg` feature).
//!
//! Configured for strict frame-synchronous operation: constant quantizer
//! (qmin = qmax), no B-frames, zerolatency tune, so one raster in yields
//! one access unit out and packets can be decoded without a parser. SPS
//! and PPS travel in-band, which keeps fixup frames self-contained.

use bytes::Bytes;
use ffmpeg_next as ffmpeg;

use crate::codec::{CodecEngine, CodecError, CompressedFrame, FrameDecoder, FrameEncoder};
use crate::raster::Raster;

fn open_failure(reason: impl std::fmt::Display) -> CodecError {
    CodecError::OpenFailure {
        reason: reason.to_string(),
    }
}

fn runtime(operation: &'static str, reason: impl std::fmt::Display) -> CodecError {
    CodecError::Runtime {
        operation,
        reason: reason.to_string(),
    }
}

/// libavcodec-backed engine producing real H.264 bitstreams.
pub struct H264Engine;

impl H264Engine {
    /// # Errors
    /// - `CodecError::OpenFailure` - libavcodec initialization failed
    pub fn new() -> Result<Self, CodecError> {
        ffmpeg::init().map_err(open_failure)?;
        Ok(Self)
    }
}

impl CodecEngine for H264Engine {
    fn open_encoder(
        &self,
        width: u32,
        height: u32,
        quantizer: u32,
    ) -> Result<Box<dyn FrameEncoder>, CodecError> {
        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .ok_or_else(|| open_failure("no H.264 encoder in this libavcodec build"))?;
        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let mut encoder = context.encoder().video().map_err(open_failure)?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ffmpeg::format::Pixel::YUV420P);
        encoder.set_time_base(ffmpeg::Rational(1, 20));
        encoder.set_frame_rate(Some(ffmpeg::Rational(60, 1)));
        encoder.set_gop(0);
        encoder.set_max_b_frames(0);
        encoder.set_qmin(quantizer as i32);
        encoder.set_qmax(quantizer as i32);

        let mut options = ffmpeg::Dictionary::new();
        options.set("tune", "zerolatency");
        options.set("preset", "fast");

        let encoder = encoder.open_with(options).map_err(open_failure)?;
        Ok(Box::new(H264Encoder {
            encoder,
            width,
            height,
            quantizer,
            frame_count: 0,
        }))
    }

    fn open_decoder(&self, width: u32, height: u32) -> Result<Box<dyn FrameDecoder>, CodecError> {
        let codec = ffmpeg::decoder::find(ffmpeg::codec::Id::H264)
            .ok_or_else(|| open_failure("no H.264 decoder in this libavcodec build"))?;
        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let decoder = context.decoder().video().map_err(open_failure)?;
        Ok(Box::new(H264Decoder {
            decoder,
            width,
            height,
        }))
    }

    fn name(&self) -> &'static str {
        "h264"
    }
}

struct H264Encoder {
    encoder: ffmpeg::encoder::video::Encoder,
    width: u32,
    height: u32,
    quantizer: u32,
    frame_count: i64,
}

impl H264Encoder {
    fn fill_frame(&self, raster: &Raster) -> ffmpeg::frame::Video {
        let mut frame =
            ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, self.width, self.height);
        let (width, height) = (self.width as usize, self.height as usize);

        let planes = [
            (0, raster.luma(), width, height),
            (1, raster.chroma_u(), width / 2, height / 2),
            (2, raster.chroma_v(), width / 2, height / 2),
        ];
        for (plane, source, row_len, rows) in planes {
            let stride = frame.stride(plane);
            let data = frame.data_mut(plane);
            for row in 0..rows {
                data[row * stride..row * stride + row_len]
                    .copy_from_slice(&source[row * row_len..(row + 1) * row_len]);
            }
        }
        frame
    }
}

impl FrameEncoder for H264Encoder {
    fn encode(&mut self, raster: &Raster) -> Result<CompressedFrame, CodecError> {
        let mut frame = self.fill_frame(raster);
        frame.set_pts(Some(self.frame_count));
        self.frame_count += 1;

        self.encoder
            .send_frame(&frame)
            .map_err(|e| runtime("send_frame", e))?;

        let mut packet = ffmpeg::Packet::empty();
        let mut output: Option<Bytes> = None;
        let mut packets = 0usize;
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packets += 1;
                    if packets > 1 {
                        return Err(CodecError::ProtocolViolation { packets });
                    }
                    output = packet.data().map(Bytes::copy_from_slice);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => break,
                Err(ffmpeg::Error::Eof) => break,
                Err(e) => return Err(runtime("receive_packet", e)),
            }
        }

        match output {
            Some(data) if !data.is_empty() => Ok(CompressedFrame {
                data,
                quantizer: self.quantizer,
            }),
            // Zerolatency is configured exactly so this cannot happen for
            // valid input; an empty drain means misconfiguration.
            _ => Err(CodecError::NoOutput),
        }
    }

    fn quantizer(&self) -> u32 {
        self.quantizer
    }
}

struct H264Decoder {
    decoder: ffmpeg::decoder::Video,
    width: u32,
    height: u32,
}

impl FrameDecoder for H264Decoder {
    fn decode(&mut self, frame: &CompressedFrame) -> Result<Option<Raster>, CodecError> {
        // Each payload is one complete access unit, so no parser is
        // needed between the wire and the decoder.
        let packet = ffmpeg::Packet::copy(&frame.data);
        self.decoder
            .send_packet(&packet)
            .map_err(|e| runtime("send_packet", e))?;

        let mut decoded = ffmpeg::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                return Ok(None);
            }
            Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => return Err(runtime("receive_frame", e)),
        }

        let (width, height) = (self.width as usize, self.height as usize);
        let mut data = Vec::with_capacity(Raster::frame_len(self.width, self.height));
        let planes = [(0usize, width, height), (1, width / 2, height / 2), (2, width / 2, height / 2)];
        for (plane, row_len, rows) in planes {
            let stride = decoded.stride(plane);
            let source = decoded.data(plane);
            for row in 0..rows {
                data.extend_from_slice(&source[row * stride..row * stride + row_len]);
            }
        }

        let raster = Raster::from_vec(self.width, self.height, data)
            .map_err(|e| runtime("plane copy", e))?;
        Ok(Some(raster))
    }
}
