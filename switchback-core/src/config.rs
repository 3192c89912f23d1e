//! Centralized session configuration.
//!
//! All tunable parameters live here instead of being scattered through
//! the pipelines. Both ends of a link must be constructed from the same
//! configuration: the wire format carries rung indices, so the meaning
//! of an index is established out of band by this struct.

/// Errors from configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid dimensions {width}x{height}: must be nonzero and even")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("quality ladder has no rungs")]
    EmptyLadder,

    #[error("invalid quantizer {quantizer}: must be within 1..={max}")]
    InvalidQuantizer { quantizer: u32, max: u32 },
}

/// Session parameters shared by sender and receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Picture width in pixels (even).
    pub width: u32,
    /// Picture height in pixels (even).
    pub height: u32,
    /// One quantizer per rung, rung 0 first. Lower quantizer means higher
    /// quality and larger frames.
    pub quantizers: Vec<u32>,
}

/// Largest quantizer any supported engine accepts.
pub const MAX_QUANTIZER: u32 = 64;

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            quantizers: vec![16, 48], // high, low
        }
    }
}

impl SessionConfig {
    /// Number of rungs in the quality ladder.
    pub fn rung_count(&self) -> usize {
        self.quantizers.len()
    }

    /// Byte length of one raw frame at these dimensions.
    pub fn frame_len(&self) -> usize {
        crate::raster::Raster::frame_len(self.width, self.height)
    }

    /// Checks the invariants the pipelines rely on.
    ///
    /// # Errors
    /// - `ConfigError::InvalidDimensions` - zero or odd width/height
    /// - `ConfigError::EmptyLadder` - no quantizers configured
    /// - `ConfigError::InvalidQuantizer` - quantizer out of engine range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.quantizers.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        for &quantizer in &self.quantizers {
            if quantizer == 0 || quantizer > MAX_QUANTIZER {
                return Err(ConfigError::InvalidQuantizer {
                    quantizer,
                    max: MAX_QUANTIZER,
                });
            }
        }
        Ok(())
    }
}
