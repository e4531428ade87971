// SPDX-License-Identifier: GPL-3.0-only

//! MJPEG-in-AVI encoder sink
//!
//! Writes a RIFF AVI container with one `vids/MJPG` stream: each frame is
//! JPEG-compressed and appended as a `00dc` chunk, with a standard `idx1`
//! index at the end. Header size fields are written as placeholders and
//! patched when the stream is finalized, so a file that was never finalized
//! is rejected by the output-integrity check.
//!
//! The bitrate hint is honored by mapping the per-frame byte budget onto a
//! JPEG quality setting.

use super::{EncoderBackend, EncoderSink};
use crate::backends::camera::types::{Frame, Resolution};
use crate::errors::RecordingError;
use crate::media::codec::Fourcc;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Patch offsets into the fixed header written by `write_header`
mod patch {
    /// RIFF chunk size
    pub const RIFF_SIZE: u64 = 4;
    /// avih dwTotalFrames
    pub const TOTAL_FRAMES: u64 = 48;
    /// avih dwSuggestedBufferSize
    pub const AVIH_BUFFER_SIZE: u64 = 60;
    /// strh dwLength
    pub const STREAM_LENGTH: u64 = 140;
    /// strh dwSuggestedBufferSize
    pub const STRH_BUFFER_SIZE: u64 = 144;
    /// movi LIST size
    pub const MOVI_SIZE: u64 = 216;
}

/// Byte length of the fixed header up to and including the movi LIST tag
const HEADER_LEN: u64 = 224;

/// AVIF_HASINDEX: an idx1 chunk follows the movi list
const AVIF_HASINDEX: u32 = 0x0000_0010;

/// AVIIF_KEYFRAME: every MJPEG frame is independently decodable
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

/// Default JPEG quality when no bitrate hint was given
const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encoder backend producing MJPEG/AVI files
///
/// Only answers for the `MJPG` codec tag; any other tag reports
/// "unavailable" so fallback selection can continue.
pub struct MjpegAviEncoder;

impl MjpegAviEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MjpegAviEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderBackend for MjpegAviEncoder {
    fn open(
        &self,
        path: &Path,
        fourcc: Fourcc,
        fps: u32,
        resolution: Resolution,
    ) -> Option<Box<dyn EncoderSink>> {
        if fourcc != Fourcc::new(b"MJPG") {
            debug!(%fourcc, "MJPEG backend cannot provide this codec");
            return None;
        }

        match MjpegAviSink::create(path, fps, resolution) {
            Ok(sink) => Some(Box::new(sink)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open MJPEG/AVI sink");
                // No partial file may survive a failed open
                let _ = std::fs::remove_file(path);
                None
            }
        }
    }
}

/// One open MJPEG/AVI output stream
struct MjpegAviSink {
    writer: BufWriter<File>,
    path: PathBuf,
    resolution: Resolution,
    fps: u32,
    /// Content bytes of the movi LIST, starting at 4 for the "movi" tag
    movi_content: u64,
    /// (offset into movi list, chunk data size) per frame, for idx1
    index: Vec<(u32, u32)>,
    /// Largest frame chunk seen, for the suggested-buffer-size fields
    max_chunk: u32,
    jpeg_quality: u8,
}

impl MjpegAviSink {
    fn create(path: &Path, fps: u32, resolution: Resolution) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut sink = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            resolution,
            fps: fps.max(1),
            movi_content: 4,
            index: Vec::new(),
            max_chunk: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        };
        sink.write_header()?;
        Ok(sink)
    }

    fn put_u32(&mut self, v: u32) -> std::io::Result<()> {
        self.writer.write_all(&v.to_le_bytes())
    }

    fn put_u16(&mut self, v: u16) -> std::io::Result<()> {
        self.writer.write_all(&v.to_le_bytes())
    }

    fn put_tag(&mut self, tag: &[u8; 4]) -> std::io::Result<()> {
        self.writer.write_all(tag)
    }

    /// Fixed 224-byte header; size and frame-count fields are zero
    /// placeholders patched by `finish`
    fn write_header(&mut self) -> std::io::Result<()> {
        let Resolution { width, height } = self.resolution;
        let micro_sec_per_frame = 1_000_000 / self.fps;

        self.put_tag(b"RIFF")?;
        self.put_u32(0)?; // riff size, patched
        self.put_tag(b"AVI ")?;

        // hdrl list: "hdrl" + avih chunk (64) + strl list (124)
        self.put_tag(b"LIST")?;
        self.put_u32(192)?;
        self.put_tag(b"hdrl")?;

        self.put_tag(b"avih")?;
        self.put_u32(56)?;
        self.put_u32(micro_sec_per_frame)?;
        self.put_u32(0)?; // max bytes per sec
        self.put_u32(0)?; // padding granularity
        self.put_u32(AVIF_HASINDEX)?;
        self.put_u32(0)?; // total frames, patched
        self.put_u32(0)?; // initial frames
        self.put_u32(1)?; // stream count
        self.put_u32(0)?; // suggested buffer size, patched
        self.put_u32(width)?;
        self.put_u32(height)?;
        for _ in 0..4 {
            self.put_u32(0)?; // reserved
        }

        // strl list: "strl" + strh chunk (64) + strf chunk (48)
        self.put_tag(b"LIST")?;
        self.put_u32(116)?;
        self.put_tag(b"strl")?;

        self.put_tag(b"strh")?;
        self.put_u32(56)?;
        self.put_tag(b"vids")?;
        self.put_tag(b"MJPG")?;
        self.put_u32(0)?; // flags
        self.put_u16(0)?; // priority
        self.put_u16(0)?; // language
        self.put_u32(0)?; // initial frames
        self.put_u32(1)?; // scale
        self.put_u32(self.fps)?; // rate: rate/scale = fps
        self.put_u32(0)?; // start
        self.put_u32(0)?; // length in frames, patched
        self.put_u32(0)?; // suggested buffer size, patched
        self.put_u32(u32::MAX)?; // quality: driver default
        self.put_u32(0)?; // sample size: variable
        self.put_u16(0)?; // rcFrame left
        self.put_u16(0)?; // rcFrame top
        self.put_u16(width as u16)?; // rcFrame right
        self.put_u16(height as u16)?; // rcFrame bottom

        self.put_tag(b"strf")?;
        self.put_u32(40)?;
        self.put_u32(40)?; // BITMAPINFOHEADER biSize
        self.put_u32(width)?;
        self.put_u32(height)?;
        self.put_u16(1)?; // planes
        self.put_u16(24)?; // bit count
        self.put_tag(b"MJPG")?; // compression
        self.put_u32(width * height * 3)?; // image size
        self.put_u32(0)?; // x pels per meter
        self.put_u32(0)?; // y pels per meter
        self.put_u32(0)?; // colors used
        self.put_u32(0)?; // colors important

        // movi list; size covers the tag plus all frame chunks, patched
        self.put_tag(b"LIST")?;
        self.put_u32(0)?;
        self.put_tag(b"movi")?;

        debug_assert_eq!(self.writer.stream_position()?, HEADER_LEN);
        Ok(())
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, RecordingError> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode(
                &frame.data,
                frame.resolution.width,
                frame.resolution.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| RecordingError::EncodeWriteFailed(format!("jpeg encode: {}", e)))?;
        Ok(jpeg)
    }
}

impl EncoderSink for MjpegAviSink {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if frame.resolution != self.resolution {
            return Err(RecordingError::EncodeWriteFailed(format!(
                "frame is {}, stream is {}",
                frame.resolution, self.resolution
            )));
        }

        let jpeg = self.encode_jpeg(frame)?;
        let size = jpeg.len() as u32;
        let offset = self.movi_content as u32;

        let io_err = |e: std::io::Error| RecordingError::EncodeWriteFailed(e.to_string());
        self.put_tag(b"00dc").map_err(io_err)?;
        self.put_u32(size).map_err(io_err)?;
        self.writer.write_all(&jpeg).map_err(io_err)?;
        let pad = (size % 2) as u64;
        if pad == 1 {
            self.writer.write_all(&[0]).map_err(io_err)?;
        }

        self.index.push((offset, size));
        self.movi_content += 8 + size as u64 + pad;
        self.max_chunk = self.max_chunk.max(size);
        Ok(())
    }

    fn set_bitrate_hint(&mut self, kbps: u32) {
        // Map the per-frame byte budget onto JPEG quality. The scale factor
        // is a heuristic tuned so the HD presets land in the 40-95 band.
        let target_frame_bytes = (kbps as u64 * 1000 / 8) / self.fps as u64;
        let raw_frame_bytes = self.resolution.pixel_count() * 3;
        let ratio = target_frame_bytes as f64 / raw_frame_bytes as f64;
        self.jpeg_quality = (ratio * 400.0).clamp(40.0, 95.0) as u8;
        debug!(kbps, quality = self.jpeg_quality, "Applied bitrate hint to JPEG quality");
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().sync_data();
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecordingError> {
        let io_err = |e: std::io::Error| RecordingError::EncodeWriteFailed(e.to_string());

        // idx1: one entry per frame chunk, offsets relative to "movi"
        let entries = std::mem::take(&mut self.index);
        self.put_tag(b"idx1").map_err(io_err)?;
        self.put_u32(entries.len() as u32 * 16).map_err(io_err)?;
        for (offset, size) in &entries {
            self.put_tag(b"00dc").map_err(io_err)?;
            self.put_u32(AVIIF_KEYFRAME).map_err(io_err)?;
            self.put_u32(*offset).map_err(io_err)?;
            self.put_u32(*size).map_err(io_err)?;
        }
        self.writer.flush().map_err(io_err)?;

        // Patch the placeholder size fields now that totals are known
        let file_len = self.writer.stream_position().map_err(io_err)?;
        let frames = entries.len() as u32;
        let patches = [
            (patch::RIFF_SIZE, (file_len - 8) as u32),
            (patch::TOTAL_FRAMES, frames),
            (patch::AVIH_BUFFER_SIZE, self.max_chunk),
            (patch::STREAM_LENGTH, frames),
            (patch::STRH_BUFFER_SIZE, self.max_chunk),
            (patch::MOVI_SIZE, self.movi_content as u32),
        ];
        for (pos, value) in patches {
            self.writer.seek(SeekFrom::Start(pos)).map_err(io_err)?;
            self.writer.write_all(&value.to_le_bytes()).map_err(io_err)?;
        }
        self.writer.flush().map_err(io_err)?;
        self.writer.get_ref().sync_all().map_err(io_err)?;

        debug!(path = %self.path.display(), frames, bytes = file_len, "Finalized AVI container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        std::env::temp_dir().join(format!("mjpeg-avi-{}-{}-{}.avi", name, std::process::id(), nanos))
    }

    fn rgb_frame(res: Resolution, seed: u8) -> Frame {
        let data = (0..res.rgb_len())
            .map(|i| (i as u8).wrapping_add(seed))
            .collect();
        Frame::new(data, res).unwrap()
    }

    #[test]
    fn rejects_non_mjpg_fourcc() {
        let backend = MjpegAviEncoder::new();
        let path = temp_path("fourcc");
        assert!(
            backend
                .open(&path, Fourcc::new(b"avc1"), 30, Resolution::new(64, 64))
                .is_none()
        );
        assert!(!path.exists());
    }

    #[test]
    fn writes_valid_riff_structure() {
        let backend = MjpegAviEncoder::new();
        let path = temp_path("riff");
        let res = Resolution::new(64, 48);
        let mut sink = backend
            .open(&path, Fourcc::new(b"MJPG"), 30, res)
            .unwrap();

        for i in 0..10 {
            sink.write(&rgb_frame(res, i)).unwrap();
        }
        sink.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        // riff size field covers everything after the first 8 bytes
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        // total frame count was patched in
        let frames = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
        assert_eq!(frames, 10);
        // idx1 index is present
        assert!(bytes.windows(4).any(|w| w == b"idx1"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rejects_frame_with_wrong_resolution() {
        let backend = MjpegAviEncoder::new();
        let path = temp_path("mismatch");
        let mut sink = backend
            .open(&path, Fourcc::new(b"MJPG"), 30, Resolution::new(64, 48))
            .unwrap();
        let res = sink.write(&rgb_frame(Resolution::new(32, 32), 0));
        assert!(matches!(res, Err(RecordingError::EncodeWriteFailed(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bitrate_hint_changes_output_size() {
        let res = Resolution::new(160, 120);
        let make = |kbps: Option<u32>, name: &str| {
            let path = temp_path(name);
            let backend = MjpegAviEncoder::new();
            let mut sink = backend.open(&path, Fourcc::new(b"MJPG"), 30, res).unwrap();
            if let Some(kbps) = kbps {
                sink.set_bitrate_hint(kbps);
            }
            for i in 0..5 {
                sink.write(&rgb_frame(res, i * 7)).unwrap();
            }
            sink.finish().unwrap();
            let size = std::fs::metadata(&path).unwrap().len();
            std::fs::remove_file(&path).unwrap();
            size
        };

        // A starving bitrate must not produce a larger file than a generous one
        let low = make(Some(50), "low");
        let high = make(Some(50_000), "high");
        assert!(low <= high, "low={} high={}", low, high);
    }
}
