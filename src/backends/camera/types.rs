// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Frame resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Expected byte length of a packed RGB24 frame at this resolution
    pub fn rgb_len(&self) -> usize {
        (self.pixel_count() * 3) as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    /// Parses "WIDTHxHEIGHT", e.g. "1280x720"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid resolution '{}', expected WIDTHxHEIGHT", s))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid width in '{}'", s))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid height in '{}'", s))?;
        if width == 0 || height == 0 {
            return Err(format!("zero dimension in '{}'", s));
        }
        Ok(Resolution::new(width, height))
    }
}

/// One decoded RGB24 frame from a capture source
///
/// Pixel data is packed row-major RGB, 3 bytes per pixel. The Arc lets the
/// pump hand the same frame to the recorder and the preview downscaler
/// without copying.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB24 pixel data
    pub data: Arc<[u8]>,
    /// Frame dimensions
    pub resolution: Resolution,
    /// Capture timestamp
    pub captured_at: Instant,
}

impl Frame {
    /// Build a frame, validating the buffer length against the resolution
    pub fn new(data: Vec<u8>, resolution: Resolution) -> Result<Self, String> {
        if data.len() != resolution.rgb_len() {
            return Err(format!(
                "frame buffer {} bytes, expected {} for {}",
                data.len(),
                resolution.rgb_len(),
                resolution
            ));
        }
        Ok(Self {
            data: data.into(),
            resolution,
            captured_at: Instant::now(),
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}, {} bytes)", self.resolution, self.data.len())
    }
}

/// An enumerable camera device
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Backend device index, the id used to open it
    pub index: u32,
    /// Human-readable device name (V4L2 card string or synthetic label)
    pub name: String,
    /// Device node path where applicable (e.g. /dev/video0)
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_and_displays() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!(res, Resolution::new(1280, 720));
        assert_eq!(res.to_string(), "1280x720");
        assert!("1280".parse::<Resolution>().is_err());
        assert!("0x720".parse::<Resolution>().is_err());
    }

    #[test]
    fn frame_rejects_wrong_buffer_length() {
        let res = Resolution::new(4, 4);
        assert!(Frame::new(vec![0; res.rgb_len()], res).is_ok());
        assert!(Frame::new(vec![0; 5], res).is_err());
    }
}
