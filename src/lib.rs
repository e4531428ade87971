// SPDX-License-Identifier: GPL-3.0-only

//! Webcam Recorder - USB webcam preview and recording
//!
//! This library provides the capture and recording pipeline behind the
//! `webcam-recorder` binary: device capture, paced encoding into a video
//! container, and a lossy single-slot preview channel.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`controller`]: Application-facing pipeline handle
//! - [`backends`]: Camera capture backend abstraction
//! - [`media`]: Codec selection and encoder backends
//! - [`pipelines`]: Frame pump, recorder, pacing, and preview
//! - [`config`]: Shared state and persisted preferences
//! - [`storage`]: Output paths, write probing, and file validation

pub mod backends;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::types::{CameraDevice, Frame, Resolution};
pub use config::{CaptureConfig, RecorderPrefs};
pub use constants::QualityPreset;
pub use controller::SessionController;
pub use errors::{AppError, AppResult};
pub use media::codec::Fourcc;
pub use pipelines::pump::StatusEvent;
