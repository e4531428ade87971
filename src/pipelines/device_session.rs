// SPDX-License-Identifier: GPL-3.0-only

//! Device session lifecycle
//!
//! A session owns one open capture source bound to a (device id, requested
//! resolution) pair. Sessions are reopened, never mutated in place, when the
//! pair changes; dropping the session releases the device handle. At most
//! one session exists per pump.

use crate::backends::camera::{CaptureBackend, CaptureSource};
use crate::backends::camera::types::{Frame, Resolution};
use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use tracing::{debug, info};

/// One open capture device bound to a (device id, resolution) pair
pub struct DeviceSession {
    source: Box<dyn CaptureSource>,
    device_id: u32,
    requested: Resolution,
    actual: Resolution,
}

impl DeviceSession {
    /// Open a session for the given configuration.
    ///
    /// The caller must have dropped any previous session first, so device
    /// handles never leak across reconfiguration.
    pub fn open(
        backend: &dyn CaptureBackend,
        config: &CaptureConfig,
    ) -> Result<Self, CaptureError> {
        let source = backend.open(config.device_id, config.resolution, config.target_fps)?;
        let actual = source.actual_resolution();
        info!(device_id = config.device_id, requested = %config.resolution, %actual,
            "Opened device session");
        Ok(Self {
            source,
            device_id: config.device_id,
            requested: config.resolution,
            actual,
        })
    }

    /// Whether this session still matches the configured pair
    pub fn matches(&self, config: &CaptureConfig) -> bool {
        self.device_id == config.device_id && self.requested == config.resolution
    }

    /// Read one frame from the device
    pub fn read(&mut self) -> Result<Frame, CaptureError> {
        self.source.read()
    }

    /// Resolution the device actually negotiated; downstream consumers size
    /// from this, not from the request
    pub fn actual_resolution(&self) -> Resolution {
        self.actual
    }

    /// Whether the device negotiated something other than the request
    pub fn resolution_differs(&self) -> bool {
        self.actual != self.requested
    }

    /// Requested resolution this session was bound with
    pub fn requested_resolution(&self) -> Resolution {
        self.requested
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        debug!(device_id = self.device_id, "Releasing device session");
    }
}
