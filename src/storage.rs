// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for recording output files

use crate::constants::output;
use crate::errors::RecordingError;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Probe the target directory for writability before opening any encoder.
///
/// Creates and deletes a transient marker file; failure means the recording
/// start must be aborted before a stream is opened.
pub fn probe_writable(dir: &Path) -> Result<(), RecordingError> {
    let marker = dir.join(output::WRITE_PROBE_NAME);
    let result = fs::File::create(&marker)
        .and_then(|mut f| f.write_all(b"probe"))
        .and_then(|_| fs::remove_file(&marker));
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            // Don't leave the marker behind if creation worked but removal failed
            let _ = fs::remove_file(&marker);
            warn!(dir = %dir.display(), error = %e, "Write probe failed");
            Err(RecordingError::DirectoryNotWritable(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        }
    }
}

/// Timestamp fragment used in output file names
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Output path `video_<YYYYMMDD_HHMMSS>.<ext>` inside the target directory
pub fn output_path(dir: &Path, stamp: &str, extension: &str) -> PathBuf {
    dir.join(format!("video_{}.{}", stamp, extension))
}

/// Validate a finalized recording.
///
/// A missing file reports `OutputMissing`. A file below the integrity
/// threshold is deleted and reported as `OutputTooSmall`; this guards
/// against empty or corrupt containers from an encoder that opened but
/// never wrote valid data. Returns the file size on success.
pub fn validate_output(path: &Path) -> Result<u64, RecordingError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Err(RecordingError::OutputMissing),
    };
    let size = meta.len();
    if size < output::MIN_FILE_BYTES {
        debug!(path = %path.display(), size, "Removing undersized output file");
        let _ = fs::remove_file(path);
        return Err(RecordingError::OutputTooSmall { size });
    }
    Ok(size)
}
