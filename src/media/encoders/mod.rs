// SPDX-License-Identifier: GPL-3.0-only

//! Encoder sink abstraction
//!
//! The recorder talks to encoders through these traits. A backend is asked
//! to open a stream for one codec tag at a time during fallback selection;
//! returning `None` means "this codec is not available here" and selection
//! moves on. A backend that fails mid-open must clean up any partial file
//! before returning `None`.

pub mod mjpeg_avi;
pub mod synthetic;

use crate::backends::camera::types::{Frame, Resolution};
use crate::errors::RecordingError;
use crate::media::codec::Fourcc;
use std::path::Path;

/// An open encoder stream writing one output file
pub trait EncoderSink: Send {
    /// Append one frame to the stream
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    /// Pass a target bitrate hint in kbps.
    ///
    /// Best-effort by contract: a sink that cannot honor it does nothing.
    /// This is a documented no-op path, never an error.
    fn set_bitrate_hint(&mut self, _kbps: u32) {}

    /// Best-effort durability flush of data written so far
    fn flush(&mut self) {}

    /// Finalize the container and close the file
    fn finish(self: Box<Self>) -> Result<(), RecordingError>;
}

/// Factory for encoder sinks
pub trait EncoderBackend: Send {
    /// Try to open an output stream for the given codec tag.
    ///
    /// `None` means the codec is unavailable on this backend, which is an
    /// expected outcome during fallback selection, not an error.
    fn open(
        &self,
        path: &Path,
        fourcc: Fourcc,
        fps: u32,
        resolution: Resolution,
    ) -> Option<Box<dyn EncoderSink>>;
}
