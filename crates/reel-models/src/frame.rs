//! Output frame geometry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// Standard portrait (9:16) for Shorts/Reels/TikTok
    pub const PORTRAIT_1080: FrameSize = FrameSize {
        width: 1080,
        height: 1920,
    };

    /// Create a new frame size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a decimal.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Formats as FFmpeg's `WxH` size argument.
    pub fn as_ffmpeg_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::PORTRAIT_1080
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FrameSize {
    type Err = FrameSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| FrameSizeParseError::InvalidFormat(s.to_string()))?;

        let width = w
            .trim()
            .parse()
            .map_err(|_| FrameSizeParseError::InvalidNumber(w.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| FrameSizeParseError::InvalidNumber(h.to_string()))?;

        if width == 0 || height == 0 {
            return Err(FrameSizeParseError::ZeroValue);
        }
        // libx264 with yuv420p needs even dimensions
        if width % 2 != 0 || height % 2 != 0 {
            return Err(FrameSizeParseError::OddDimension(s.to_string()));
        }

        Ok(FrameSize { width, height })
    }
}

#[derive(Debug, Error)]
pub enum FrameSizeParseError {
    #[error("Invalid frame size format: {0}, expected 'WxH'")]
    InvalidFormat(String),
    #[error("Invalid number in frame size: {0}")]
    InvalidNumber(String),
    #[error("Frame size cannot have zero values")]
    ZeroValue,
    #[error("Frame size must have even dimensions: {0}")]
    OddDimension(String),
}
