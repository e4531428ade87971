// SPDX-License-Identifier: GPL-3.0-only

//! Preview channel and preview frame derivation
//!
//! A single-slot mailbox between the capture loop and the display consumer:
//! the producer overwrites an undelivered frame, the consumer takes or
//! skips. The producer never blocks and the channel never grows beyond one
//! frame.

use crate::backends::camera::types::{Frame, Resolution};
use crate::constants::preview;
use image::RgbImage;
use image::imageops::FilterType;
use std::sync::{Arc, Mutex};

/// Create a connected producer/consumer pair
pub fn channel() -> (PreviewProducer, PreviewConsumer) {
    let slot = Arc::new(Mutex::new(None));
    (
        PreviewProducer {
            slot: Arc::clone(&slot),
        },
        PreviewConsumer { slot },
    )
}

/// Producer half held by the capture loop
pub struct PreviewProducer {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl PreviewProducer {
    /// Publish a frame, overwriting any undelivered one. Never blocks
    /// beyond the slot's own mutex.
    pub fn publish(&self, frame: Frame) {
        *self.slot.lock().unwrap() = Some(frame);
    }
}

/// Consumer half held by the display layer
pub struct PreviewConsumer {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl PreviewConsumer {
    /// Take the most recent frame, leaving the slot empty
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().unwrap().take()
    }
}

/// Preview resolution for a given capture resolution: aspect-preserving
/// downscale capped at the maximum preview width, height kept even.
pub fn preview_size(capture: Resolution) -> Resolution {
    let width = capture.width.min(preview::MAX_WIDTH);
    let height = ((width as u64 * capture.height as u64) / capture.width.max(1) as u64) as u32;
    Resolution::new(width, height.max(2) & !1)
}

/// Downscale a captured frame to the preview resolution.
///
/// Returns the frame unchanged when it already fits the target.
pub fn downscale(frame: &Frame, target: Resolution) -> Frame {
    if frame.resolution == target {
        return frame.clone();
    }

    let src = RgbImage::from_raw(
        frame.resolution.width,
        frame.resolution.height,
        frame.data.to_vec(),
    );
    let Some(src) = src else {
        // Length was validated at frame construction; fall back to the
        // original frame rather than panic
        return frame.clone();
    };

    let resized = image::imageops::resize(&src, target.width, target.height, FilterType::Triangle);
    Frame {
        data: resized.into_raw().into(),
        resolution: target,
        captured_at: frame.captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(res: Resolution, value: u8) -> Frame {
        Frame::new(vec![value; res.rgb_len()], res).unwrap()
    }

    #[test]
    fn newest_frame_overwrites_undelivered_one() {
        let (tx, rx) = channel();
        let res = Resolution::new(4, 4);
        for value in 0..50u8 {
            tx.publish(frame(res, value));
        }
        let delivered = rx.take().unwrap();
        assert_eq!(delivered.data[0], 49);
        // Exactly one frame was in flight
        assert!(rx.take().is_none());
    }

    #[test]
    fn take_on_empty_channel_skips() {
        let (_tx, rx) = channel();
        assert!(rx.take().is_none());
    }

    #[test]
    fn preview_size_caps_width_and_keeps_aspect() {
        assert_eq!(
            preview_size(Resolution::new(1280, 720)),
            Resolution::new(640, 360)
        );
        assert_eq!(
            preview_size(Resolution::new(1920, 1080)),
            Resolution::new(640, 360)
        );
        // Smaller captures pass through at native size
        assert_eq!(
            preview_size(Resolution::new(320, 240)),
            Resolution::new(320, 240)
        );
    }

    #[test]
    fn downscale_produces_target_dimensions() {
        let src = frame(Resolution::new(64, 36), 7);
        let target = Resolution::new(32, 18);
        let small = downscale(&src, target);
        assert_eq!(small.resolution, target);
        assert_eq!(small.data.len(), target.rgb_len());
        // Uniform input stays uniform through the resampler
        assert!(small.data.iter().all(|&b| b == 7));
    }

    #[test]
    fn downscale_is_identity_at_target_size() {
        let res = Resolution::new(32, 18);
        let src = frame(res, 3);
        let out = downscale(&src, res);
        assert!(Arc::ptr_eq(&src.data, &out.data));
    }
}
