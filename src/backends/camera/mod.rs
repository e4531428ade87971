// SPDX-License-Identifier: GPL-3.0-only

//! Capture backend abstraction
//!
//! A `CaptureBackend` enumerates camera devices and opens them as
//! `CaptureSource` streams. The pipeline only ever talks to these traits;
//! the concrete V4L2 and synthetic backends live behind them.

pub mod format_converters;
pub mod synthetic;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use types::{CameraDevice, Frame, Resolution};

use crate::errors::CaptureError;

/// An open capture stream bound to one device
///
/// Dropping the source releases the device handle.
pub trait CaptureSource: Send {
    /// Read the next frame, blocking until the device delivers one.
    ///
    /// A failure is retryable at the pump level: the session is closed and
    /// reopened on the next iteration.
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Resolution the device actually negotiated, which may differ from the
    /// requested one. Downstream consumers size themselves from this, never
    /// from the request.
    fn actual_resolution(&self) -> Resolution;
}

/// Factory for capture sources
pub trait CaptureBackend: Send {
    /// Enumerate camera devices visible to this backend
    fn enumerate(&self) -> Vec<CameraDevice>;

    /// Open a device, requesting the given resolution and frame rate.
    ///
    /// The backend requests the format but must tolerate the device
    /// negotiating something else; the source reports the actual resolution.
    /// The frame rate is a best-effort request.
    fn open(
        &self,
        device_id: u32,
        resolution: Resolution,
        fps: u32,
    ) -> Result<Box<dyn CaptureSource>, CaptureError>;
}
