// SPDX-License-Identifier: GPL-3.0-only

//! Capture configuration and persisted user preferences

use crate::backends::camera::types::Resolution;
use crate::constants::{QualityPreset, timing};
use crate::media::codec::Fourcc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Capture configuration read by the frame pump once per loop iteration
///
/// Mutated only under the shared lock; the pump copies it out as an atomic
/// snapshot and never holds the lock across device I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Backend device index
    pub device_id: u32,
    /// Requested capture resolution
    pub resolution: Resolution,
    /// Target capture/record frame rate
    pub target_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            resolution: Resolution::new(1280, 720),
            target_fps: timing::DEFAULT_FPS,
        }
    }
}

/// State shared between the controller and the frame pump
///
/// The single mutual-exclusion lock of the pipeline. Held only for
/// snapshots and field updates.
#[derive(Debug, Clone)]
pub struct SharedState {
    /// Current capture configuration
    pub capture: CaptureConfig,
    /// User-preferred codec tag for the next recording
    pub codec: Fourcc,
    /// Quality preset for the next recording
    pub quality: QualityPreset,
    /// Whether a recording session is currently open (written by the pump)
    pub recording: bool,
}

impl SharedState {
    pub fn new(capture: CaptureConfig, codec: Fourcc, quality: QualityPreset) -> Self {
        Self {
            capture,
            codec,
            quality,
            recording: false,
        }
    }
}

/// Handle to the shared pipeline state
pub type SharedHandle = Arc<Mutex<SharedState>>;

/// Persisted user preferences
///
/// Stored as JSON under the user config directory and reloaded on the next
/// run. Codec is kept as its printable tag so the file stays hand-editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderPrefs {
    pub device_id: u32,
    pub resolution: Resolution,
    pub fps: u32,
    pub codec: String,
    pub quality: QualityPreset,
    /// Last directory a recording was saved into
    pub output_dir: Option<PathBuf>,
}

impl Default for RecorderPrefs {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            device_id: capture.device_id,
            resolution: capture.resolution,
            fps: capture.target_fps,
            codec: "avc1".to_string(),
            quality: QualityPreset::default(),
            output_dir: None,
        }
    }
}

impl RecorderPrefs {
    /// Default preferences file location, `None` when the platform has no
    /// config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("webcam-recorder").join("prefs.json"))
    }

    /// Load preferences from the given path, falling back to defaults when
    /// the file is missing or unreadable
    pub fn load_or_default(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring malformed prefs file");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist preferences, creating parent directories as needed
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved preferences");
        Ok(())
    }

    /// Preferred codec tag, falling back to the table default on a bad value
    pub fn codec_fourcc(&self) -> Fourcc {
        self.codec
            .parse()
            .unwrap_or_else(|_| crate::media::codec::CODEC_CANDIDATES[0].fourcc)
    }
}
