// SPDX-License-Identifier: GPL-3.0-only

//! Capture and recording pipeline
//!
//! The pump is the long-lived capture loop; it owns the device session and,
//! while recording, the recorder with its open output stream. The preview
//! channel is the single-slot handoff to the display consumer.

pub mod device_session;
pub mod pacing;
pub mod preview;
pub mod pump;
pub mod recorder;

pub use preview::{PreviewConsumer, PreviewProducer, preview_size};
pub use pump::{FramePump, PumpCommand, PumpHandle, StatusEvent};
pub use recorder::{FinalizedFile, Recorder, RecordingProfile, StartedRecording, WriteFailure};
