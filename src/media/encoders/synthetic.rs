// SPDX-License-Identifier: GPL-3.0-only

//! Scriptable encoder backend for tests
//!
//! Lets tests direct which codec tags open, produce zero-byte output from an
//! encoder that "opened but never wrote", and inject write failures, so the
//! fallback, integrity, and forced-stop paths can be exercised without a
//! real encoder.

use super::{EncoderBackend, EncoderSink};
use crate::backends::camera::types::{Frame, Resolution};
use crate::errors::RecordingError;
use crate::media::codec::Fourcc;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Scriptable encoder backend
pub struct ScriptedEncoder {
    /// Codec tags this backend will open; everything else reports unavailable
    accepts: Vec<Fourcc>,
    /// Open streams write nothing at all (container from an encoder that
    /// opened but produced no data)
    write_nothing: bool,
    /// Fail frame writes after this many successful ones
    fail_write_after: Option<u64>,
    /// Every codec tag that was attempted, in order
    attempted: Arc<Mutex<Vec<Fourcc>>>,
}

impl ScriptedEncoder {
    /// Backend accepting only the given codec tags
    pub fn accepting(accepts: &[Fourcc]) -> Self {
        Self {
            accepts: accepts.to_vec(),
            write_nothing: false,
            fail_write_after: None,
            attempted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Open streams produce a zero-byte file
    pub fn with_zero_byte_output(mut self) -> Self {
        self.write_nothing = true;
        self
    }

    /// Fail frame writes after `frames` successful writes
    pub fn with_write_failure_after(mut self, frames: u64) -> Self {
        self.fail_write_after = Some(frames);
        self
    }

    /// Codec tags attempted so far, in open order
    pub fn attempted(&self) -> Arc<Mutex<Vec<Fourcc>>> {
        Arc::clone(&self.attempted)
    }
}

impl EncoderBackend for ScriptedEncoder {
    fn open(
        &self,
        path: &Path,
        fourcc: Fourcc,
        _fps: u32,
        _resolution: Resolution,
    ) -> Option<Box<dyn EncoderSink>> {
        self.attempted.lock().unwrap().push(fourcc);
        if !self.accepts.contains(&fourcc) {
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(_) => return None,
        };

        Some(Box::new(ScriptedSink {
            file,
            path: path.to_path_buf(),
            write_nothing: self.write_nothing,
            fail_write_after: self.fail_write_after,
            writes: 0,
            bitrate_hints: Vec::new(),
        }))
    }
}

/// One open scripted stream
struct ScriptedSink {
    file: File,
    path: PathBuf,
    write_nothing: bool,
    fail_write_after: Option<u64>,
    writes: u64,
    bitrate_hints: Vec<u32>,
}

impl EncoderSink for ScriptedSink {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if let Some(limit) = self.fail_write_after {
            if self.writes >= limit {
                return Err(RecordingError::EncodeWriteFailed(
                    "scripted write failure".to_string(),
                ));
            }
        }
        self.writes += 1;

        if self.write_nothing {
            return Ok(());
        }
        self.file
            .write_all(&frame.data)
            .map_err(|e| RecordingError::EncodeWriteFailed(e.to_string()))
    }

    fn set_bitrate_hint(&mut self, kbps: u32) {
        // Recorded but unused, so tests can assert the hint never errors
        self.bitrate_hints.push(kbps);
    }

    fn finish(self: Box<Self>) -> Result<(), RecordingError> {
        self.file
            .sync_all()
            .map_err(|e| RecordingError::EncodeWriteFailed(e.to_string()))?;
        tracing::debug!(path = %self.path.display(), writes = self.writes, "Scripted sink finished");
        Ok(())
    }
}
