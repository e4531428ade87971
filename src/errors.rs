// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture and recording pipeline

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture/device errors
    Capture(CaptureError),
    /// Recording errors
    Recording(RecordingError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Capture-side errors
///
/// Both variants are handled locally by the frame pump via a
/// reopen-and-retry cycle with backoff; they never abort the capture loop.
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Device could not be opened (missing, busy, or rejected the format)
    DeviceUnavailable(String),
    /// A frame read failed; transient and retryable
    CaptureFailed(String),
}

/// Recording errors
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// Target directory failed the write-permission probe
    DirectoryNotWritable(String),
    /// No codec candidate could open an output stream
    NoCodecAvailable,
    /// Writing a frame to the open stream failed; forces an immediate stop
    EncodeWriteFailed(String),
    /// Finalized output file does not exist
    OutputMissing,
    /// Finalized output file was below the integrity threshold and removed
    OutputTooSmall { size: u64 },
    /// A recording session is already open
    AlreadyRecording,
    /// Start could not be carried out (capture loop gone, reply lost)
    StartFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CaptureError::CaptureFailed(msg) => write!(f, "Frame capture failed: {}", msg),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::DirectoryNotWritable(dir) => {
                write!(f, "Directory not writable: {}", dir)
            }
            RecordingError::NoCodecAvailable => write!(f, "No codec could open an output stream"),
            RecordingError::EncodeWriteFailed(msg) => write!(f, "Encoder write failed: {}", msg),
            RecordingError::OutputMissing => write!(f, "Output file was not created"),
            RecordingError::OutputTooSmall { size } => {
                write!(f, "Output file too small ({} bytes), removed", size)
            }
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for RecordingError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}
