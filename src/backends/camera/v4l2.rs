// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture backend
//!
//! Opens /dev/videoN devices through the `v4l` crate with mmap streaming.
//! Frames are converted to packed RGB24 before leaving the backend: YUYV
//! through the BT.601 converter, MJPG through a JPEG decode.

use super::format_converters::yuyv_to_rgb;
use super::types::{CameraDevice, Frame, Resolution};
use super::{CaptureBackend, CaptureSource};
use crate::errors::CaptureError;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

/// Number of mmap buffers to queue on the device
const BUFFER_COUNT: u32 = 4;

/// Pixel formats this backend can convert to RGB24
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Yuyv,
    Mjpg,
}

/// V4L2 capture backend
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for V4l2Backend {
    fn enumerate(&self) -> Vec<CameraDevice> {
        let mut devices: Vec<CameraDevice> = v4l::context::enum_devices()
            .into_iter()
            .map(|node| CameraDevice {
                index: node.index() as u32,
                name: node
                    .name()
                    .unwrap_or_else(|| format!("Camera {}", node.index())),
                path: node.path().to_path_buf(),
            })
            .collect();
        devices.sort_by_key(|d| d.index);
        devices
    }

    fn open(
        &self,
        device_id: u32,
        resolution: Resolution,
        fps: u32,
    ) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let device = v4l::Device::new(device_id as usize).map_err(|e| {
            CaptureError::DeviceUnavailable(format!("/dev/video{}: {}", device_id, e))
        })?;

        let (actual, format) = negotiate_format(&device, resolution)?;
        if actual != resolution {
            info!(device_id, requested = %resolution, actual = %actual,
                "Device negotiated a different resolution");
        }

        // Frame rate is a best-effort request; many UVC devices pin it to
        // the format and ignore this
        let params = v4l::video::capture::Parameters::with_fps(fps);
        if let Err(e) = device.set_params(&params) {
            debug!(device_id, fps, error = %e, "Device rejected frame rate request");
        }

        let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| CaptureError::DeviceUnavailable(format!("stream setup: {}", e)))?;

        debug!(device_id, %actual, ?format, "Opened V4L2 capture stream");

        Ok(Box::new(V4l2Source {
            // The device is kept alive alongside the stream; the stream's
            // lifetime parameter only covers its mmap'd arena
            _device: device,
            stream,
            actual,
            format,
        }))
    }
}

/// Request the resolution in a format we can convert, tolerating the device
/// negotiating something else.
fn negotiate_format(
    device: &v4l::Device,
    resolution: Resolution,
) -> Result<(Resolution, SourceFormat), CaptureError> {
    for (fourcc, format) in [(b"YUYV", SourceFormat::Yuyv), (b"MJPG", SourceFormat::Mjpg)] {
        let requested = v4l::Format::new(resolution.width, resolution.height, FourCC::new(fourcc));
        let negotiated = device
            .set_format(&requested)
            .map_err(|e| CaptureError::DeviceUnavailable(format!("set format: {}", e)))?;
        if negotiated.fourcc == FourCC::new(fourcc) {
            let actual = Resolution::new(negotiated.width, negotiated.height);
            return Ok((actual, format));
        }
    }

    let fallback = device
        .format()
        .map(|f| f.fourcc.str().unwrap_or("????").to_string())
        .unwrap_or_default();
    Err(CaptureError::DeviceUnavailable(format!(
        "device only offers unsupported pixel format {}",
        fallback
    )))
}

/// One open V4L2 capture stream
struct V4l2Source {
    _device: v4l::Device,
    stream: Stream<'static>,
    actual: Resolution,
    format: SourceFormat,
}

impl CaptureSource for V4l2Source {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| CaptureError::CaptureFailed(format!("dequeue: {}", e)))?;
        if buf.is_empty() {
            return Err(CaptureError::CaptureFailed("empty buffer".to_string()));
        }

        let captured_at = Instant::now();
        let rgb = match self.format {
            SourceFormat::Yuyv => yuyv_to_rgb(buf, self.actual.width, self.actual.height),
            SourceFormat::Mjpg => decode_mjpg(buf, self.actual)?,
        };

        let mut frame =
            Frame::new(rgb, self.actual).map_err(CaptureError::CaptureFailed)?;
        frame.captured_at = captured_at;
        Ok(frame)
    }

    fn actual_resolution(&self) -> Resolution {
        self.actual
    }
}

/// Decode one MJPG frame to RGB24 at the negotiated resolution
fn decode_mjpg(buf: &[u8], expected: Resolution) -> Result<Vec<u8>, CaptureError> {
    let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
        .map_err(|e| CaptureError::CaptureFailed(format!("jpeg decode: {}", e)))?;
    let rgb = img.to_rgb8();
    if rgb.width() != expected.width || rgb.height() != expected.height {
        warn!(decoded_w = rgb.width(), decoded_h = rgb.height(), %expected,
            "MJPG frame size differs from negotiated format");
        return Err(CaptureError::CaptureFailed(
            "jpeg frame size mismatch".to_string(),
        ));
    }
    Ok(rgb.into_raw())
}
