// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test-pattern capture backend
//!
//! Produces deterministic moving-gradient RGB frames at a configurable
//! native rate. Used by the test suite and by the CLI `--synthetic` flag
//! when no real camera is available. Failure injection knobs let tests
//! exercise the pump's reopen-and-retry path.

use super::types::{CameraDevice, Frame, Resolution};
use super::{CaptureBackend, CaptureSource};
use crate::errors::CaptureError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Synthetic camera backend
pub struct SyntheticBackend {
    native_fps: u32,
    /// When set, every open negotiates this resolution regardless of the
    /// request, mimicking a device that ignores the requested format
    forced_resolution: Option<Resolution>,
    /// When set, each source fails reads after delivering this many frames
    fail_reads_after: Option<u64>,
    /// Device ids above this count fail to open
    device_count: u32,
    /// Sources currently open across all clones of these counters
    open_sources: Arc<AtomicU32>,
    /// Total sources ever opened
    total_opens: Arc<AtomicU32>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            native_fps: 60,
            forced_resolution: None,
            fail_reads_after: None,
            device_count: 1,
            open_sources: Arc::new(AtomicU32::new(0)),
            total_opens: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Native frame rate the pattern generator paces itself to
    pub fn with_native_fps(mut self, fps: u32) -> Self {
        self.native_fps = fps.max(1);
        self
    }

    /// Force every open to negotiate a fixed actual resolution
    pub fn with_forced_resolution(mut self, resolution: Resolution) -> Self {
        self.forced_resolution = Some(resolution);
        self
    }

    /// Make sources fail reads after delivering `frames` frames
    pub fn with_read_failures_after(mut self, frames: u64) -> Self {
        self.fail_reads_after = Some(frames);
        self
    }

    /// Number of synthetic devices to expose
    pub fn with_device_count(mut self, count: u32) -> Self {
        self.device_count = count;
        self
    }

    /// Counter of sources currently open; shared with every source
    pub fn open_sources(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.open_sources)
    }

    /// Counter of sources ever opened
    pub fn total_opens(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.total_opens)
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticBackend {
    fn enumerate(&self) -> Vec<CameraDevice> {
        (0..self.device_count)
            .map(|index| CameraDevice {
                index,
                name: format!("Synthetic camera {}", index),
                path: PathBuf::from(format!("synthetic:{}", index)),
            })
            .collect()
    }

    fn open(
        &self,
        device_id: u32,
        resolution: Resolution,
        _fps: u32,
    ) -> Result<Box<dyn CaptureSource>, CaptureError> {
        if device_id >= self.device_count {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no synthetic device {}",
                device_id
            )));
        }

        let actual = self.forced_resolution.unwrap_or(resolution);
        debug!(device_id, requested = %resolution, actual = %actual, "Opening synthetic source");

        self.open_sources.fetch_add(1, Ordering::SeqCst);
        self.total_opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticSource {
            actual,
            frame_interval: Duration::from_millis(1000 / self.native_fps as u64),
            frames_delivered: AtomicU64::new(0),
            fail_reads_after: self.fail_reads_after,
            open_sources: Arc::clone(&self.open_sources),
        }))
    }
}

/// One open synthetic stream
struct SyntheticSource {
    actual: Resolution,
    frame_interval: Duration,
    frames_delivered: AtomicU64,
    fail_reads_after: Option<u64>,
    open_sources: Arc<AtomicU32>,
}

impl SyntheticSource {
    /// Moving-gradient test pattern: shifts one pixel per frame so
    /// consecutive frames differ
    fn pattern(&self, frame_no: u64) -> Vec<u8> {
        let Resolution { width, height } = self.actual;
        let mut data = Vec::with_capacity(self.actual.rgb_len());
        let shift = (frame_no % width.max(1) as u64) as u32;
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        data
    }
}

impl CaptureSource for SyntheticSource {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let n = self.frames_delivered.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_reads_after {
            if n >= limit {
                return Err(CaptureError::CaptureFailed(
                    "synthetic read failure".to_string(),
                ));
            }
        }

        // Pace to the native rate so the pump sees a realistic device
        std::thread::sleep(self.frame_interval);

        let data = self.pattern(n);
        Frame::new(data, self.actual).map_err(CaptureError::CaptureFailed)
    }

    fn actual_resolution(&self) -> Resolution {
        self.actual
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.open_sources.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_negotiates_forced_resolution() {
        let backend = SyntheticBackend::new()
            .with_native_fps(1000)
            .with_forced_resolution(Resolution::new(320, 240));
        let source = backend.open(0, Resolution::new(1280, 720), 30).unwrap();
        assert_eq!(source.actual_resolution(), Resolution::new(320, 240));
    }

    #[test]
    fn read_fails_after_configured_count() {
        let backend = SyntheticBackend::new()
            .with_native_fps(1000)
            .with_read_failures_after(2);
        let mut source = backend.open(0, Resolution::new(8, 8), 30).unwrap();
        assert!(source.read().is_ok());
        assert!(source.read().is_ok());
        assert!(source.read().is_err());
    }

    #[test]
    fn drop_releases_open_slot() {
        let backend = SyntheticBackend::new().with_native_fps(1000);
        let open = backend.open_sources();
        let source = backend.open(0, Resolution::new(8, 8), 30).unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 1);
        drop(source);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_device_is_unavailable() {
        let backend = SyntheticBackend::new();
        assert!(matches!(
            backend.open(5, Resolution::new(8, 8), 30),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }
}
