// SPDX-License-Identifier: GPL-3.0-only

//! Session controller: the application-facing pipeline handle
//!
//! Wires the capture backend, encoder backend, and shared state together,
//! spawns the pump thread, and exposes the command surface. Configuration
//! setters only touch the shared lock; recording start/stop round-trips
//! through the pump so the file work happens on the capture thread.

use crate::backends::camera::CaptureBackend;
use crate::backends::camera::types::Resolution;
use crate::config::{CaptureConfig, SharedHandle, SharedState};
use crate::constants::QualityPreset;
use crate::errors::{AppError, RecordingError};
use crate::media::codec::Fourcc;
use crate::media::encoders::EncoderBackend;
use crate::pipelines::preview::{self, PreviewConsumer};
use crate::pipelines::pump::{FramePump, PumpCommand, PumpHandle, StatusEvent};
use crate::pipelines::recorder::{FinalizedFile, StartedRecording};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

pub struct SessionController {
    shared: SharedHandle,
    pump: Option<PumpHandle>,
}

impl SessionController {
    /// Build the pipeline and spawn its capture thread.
    ///
    /// Returns the controller together with the preview consumer and the
    /// status event stream.
    pub fn new(
        capture: Box<dyn CaptureBackend>,
        encoder: Box<dyn EncoderBackend>,
        config: CaptureConfig,
        codec: Fourcc,
        quality: QualityPreset,
    ) -> (Self, PreviewConsumer, UnboundedReceiver<StatusEvent>) {
        let shared: SharedHandle = Arc::new(Mutex::new(SharedState::new(config, codec, quality)));
        let (producer, consumer) = preview::channel();
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();

        let pump = FramePump::spawn(capture, encoder, Arc::clone(&shared), producer, events_tx);

        (
            Self {
                shared,
                pump: Some(pump),
            },
            consumer,
            events_rx,
        )
    }

    /// Current capture configuration snapshot
    pub fn config(&self) -> CaptureConfig {
        self.shared.lock().unwrap().capture
    }

    /// Whether a recording session is open
    pub fn is_recording(&self) -> bool {
        self.shared.lock().unwrap().recording
    }

    /// Switch to another camera device. Ignored while recording.
    pub fn set_camera(&self, device_id: u32) {
        self.update_capture(|c| c.device_id = device_id);
    }

    /// Change the requested capture resolution. Ignored while recording.
    pub fn set_resolution(&self, resolution: Resolution) {
        self.update_capture(|c| c.resolution = resolution);
    }

    /// Change the target frame rate. Ignored while recording.
    pub fn set_fps(&self, fps: u32) {
        self.update_capture(|c| c.target_fps = fps);
    }

    /// Set the preferred codec for the next recording. Ignored while
    /// recording; the open stream keeps its codec.
    pub fn set_codec(&self, codec: Fourcc) {
        let mut shared = self.shared.lock().unwrap();
        if shared.recording {
            warn!("Ignoring codec change while recording");
            return;
        }
        shared.codec = codec;
    }

    /// Set the quality preset for the next recording. Ignored while
    /// recording.
    pub fn set_quality(&self, quality: QualityPreset) {
        let mut shared = self.shared.lock().unwrap();
        if shared.recording {
            warn!("Ignoring quality change while recording");
            return;
        }
        shared.quality = quality;
    }

    /// Start recording into the given directory.
    ///
    /// The pump performs the actual start on the capture thread; this call
    /// blocks until it replies with the selected codec and output path.
    pub fn start_recording(&self, dir: &Path) -> Result<StartedRecording, AppError> {
        if self.is_recording() {
            return Err(RecordingError::AlreadyRecording.into());
        }

        let (reply, rx) = std::sync::mpsc::channel();
        self.send(PumpCommand::StartRecording {
            dir: dir.to_path_buf(),
            reply,
        })?;
        rx.recv()
            .map_err(|_| AppError::Other("capture thread exited".to_string()))?
            .map_err(AppError::from)
    }

    /// Stop and finalize the open recording. Safe no-op when idle.
    pub fn stop_recording(&self) -> Result<Option<FinalizedFile>, AppError> {
        let (reply, rx) = std::sync::mpsc::channel();
        self.send(PumpCommand::StopRecording { reply })?;
        rx.recv()
            .map_err(|_| AppError::Other("capture thread exited".to_string()))?
            .map_err(AppError::from)
    }

    /// Stop everything: finalize any open recording, stop the capture
    /// thread, and wait for it to exit.
    pub fn shutdown(mut self) {
        if let Some(pump) = self.pump.take() {
            debug!("Shutting down capture pipeline");
            pump.shutdown();
        }
    }

    fn update_capture(&self, apply: impl FnOnce(&mut CaptureConfig)) {
        let mut shared = self.shared.lock().unwrap();
        if shared.recording {
            warn!("Ignoring capture configuration change while recording");
            return;
        }
        apply(&mut shared.capture);
    }

    fn send(&self, command: PumpCommand) -> Result<(), AppError> {
        let Some(pump) = &self.pump else {
            return Err(AppError::Other("pipeline already shut down".to_string()));
        };
        pump.commands()
            .send(command)
            .map_err(|_| AppError::Other("capture thread exited".to_string()))
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.shutdown();
        }
    }
}
