// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::types::Resolution;
use serde::{Deserialize, Serialize};

/// Recording quality presets
///
/// Each preset scales the base bitrate for the active resolution tier.
/// The scaled value is passed to the encoder as a best-effort hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum QualityPreset {
    /// Smaller files, reduced quality (0.5x base bitrate)
    Low,
    /// Balanced quality and file size (default, 1.0x)
    #[default]
    Medium,
    /// Larger files, best quality (2.0x)
    Best,
}

impl QualityPreset {
    /// All preset variants in display order
    pub const ALL: [QualityPreset; 3] =
        [QualityPreset::Low, QualityPreset::Medium, QualityPreset::Best];

    /// Display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::Best => "Best",
        }
    }

    /// Bitrate multiplier applied to the base bitrate of the resolution tier
    pub fn factor(&self) -> f64 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 1.0,
            QualityPreset::Best => 2.0,
        }
    }
}

/// Resolution tiers for base-bitrate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Below 1280 wide
    SD,
    /// 1280x720
    HD,
    /// 1920x1080 and above
    FullHD,
}

/// Tier for a given frame width
pub fn resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Base bitrate in kbps for a resolution, before the quality factor
///
/// HD (1280x720) -> 4000 kbps, Full HD (1920x1080) -> 8000 kbps,
/// anything smaller -> 2000 kbps.
pub fn base_bitrate_kbps(resolution: Resolution) -> u32 {
    match resolution_tier(resolution.width) {
        ResolutionTier::SD => 2_000,
        ResolutionTier::HD => 4_000,
        ResolutionTier::FullHD => 8_000,
    }
}

/// Target bitrate hint in kbps for a resolution and quality preset
pub fn target_bitrate_kbps(resolution: Resolution, quality: QualityPreset) -> u32 {
    (base_bitrate_kbps(resolution) as f64 * quality.factor()) as u32
}

/// Resolutions offered by the UI layer
pub const STANDARD_RESOLUTIONS: [Resolution; 2] =
    [Resolution::new(1280, 720), Resolution::new(1920, 1080)];

/// Preview sizing
pub mod preview {
    /// Maximum preview width in pixels; larger frames are downscaled
    /// preserving aspect ratio
    pub const MAX_WIDTH: u32 = 640;

    /// Target preview cadence in Hz
    pub const TARGET_HZ: u32 = 30;
}

/// Output file integrity
pub mod output {
    /// Minimum byte size for a finalized recording; smaller files are
    /// treated as corrupt containers and deleted
    pub const MIN_FILE_BYTES: u64 = 2048;

    /// Transient marker file used to probe directory writability
    pub const WRITE_PROBE_NAME: &str = ".write_probe.tmp";
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Backoff after any capture error before retrying, avoids a hot spin
    /// against a disconnected device
    pub const CAPTURE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

    /// Interval between recording status ticks (elapsed time / file size)
    pub const STATUS_TICK_INTERVAL: Duration = Duration::from_secs(1);

    /// Interval between best-effort durability flushes of the open stream
    pub const SYNC_INTERVAL: Duration = Duration::from_secs(2);

    /// Default capture/record frame rate
    pub const DEFAULT_FPS: u32 = 30;
}
