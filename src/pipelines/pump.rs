// SPDX-License-Identifier: GPL-3.0-only

//! Frame pump: the capture loop thread
//!
//! One dedicated thread owns the device session and the recorder. It reads
//! frames as fast as the device delivers them, paces a subset into the open
//! recording, and publishes downscaled preview frames. The controller talks
//! to it through a command channel with per-command reply channels, so no
//! lock is ever held across device or file I/O.

use crate::backends::camera::CaptureBackend;
use crate::backends::camera::types::Resolution;
use crate::config::SharedHandle;
use crate::constants::{preview as preview_consts, timing};
use crate::errors::{CaptureError, RecordingError};
use crate::media::encoders::EncoderBackend;
use crate::pipelines::device_session::DeviceSession;
use crate::pipelines::pacing::FramePacer;
use crate::pipelines::preview::{self, PreviewProducer};
use crate::pipelines::recorder::{FinalizedFile, Recorder, RecordingProfile, StartedRecording};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Events the pipeline pushes out to whoever is watching
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// A device read or open failed; the session was closed and will be
    /// reopened after a backoff
    CaptureError { message: String },
    /// The device negotiated a different resolution than requested
    ActualResolution {
        requested: Resolution,
        actual: Resolution,
    },
    /// The preferred codec could not open and another candidate was used
    CodecFallback {
        preferred: &'static str,
        selected: &'static str,
    },
    RecordingStarted {
        path: PathBuf,
        codec: &'static str,
        bitrate_kbps: u32,
    },
    /// Periodic progress while a recording is open
    RecordingTick {
        elapsed: Duration,
        frames: u64,
        size_bytes: u64,
    },
    RecordingStopped { file: FinalizedFile },
    /// The recording ended abnormally (write failure or invalid output).
    /// When the forced finalize still produced a valid file, it is carried
    /// here so the caller learns a usable file survived.
    RecordingFailed {
        message: String,
        salvaged: Option<FinalizedFile>,
    },
}

/// Commands the controller sends to the pump thread
pub enum PumpCommand {
    StartRecording {
        dir: PathBuf,
        reply: Sender<Result<StartedRecording, RecordingError>>,
    },
    StopRecording {
        reply: Sender<Result<Option<FinalizedFile>, RecordingError>>,
    },
    Shutdown,
}

/// Handle to a running pump thread
pub struct PumpHandle {
    thread: Option<JoinHandle<()>>,
    commands: Sender<PumpCommand>,
    stop: Arc<AtomicBool>,
}

impl PumpHandle {
    pub fn commands(&self) -> Sender<PumpCommand> {
        self.commands.clone()
    }

    /// Signal the thread to stop and wait for it to finalize and exit
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Also nudge it through the command channel in case it is parked
        // in a backoff sleep shorter than the next stop check
        let _ = self.commands.send(PumpCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked during shutdown");
            }
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The capture loop state, owned entirely by the pump thread
pub struct FramePump {
    capture: Box<dyn CaptureBackend>,
    recorder: Recorder,
    shared: SharedHandle,
    preview: PreviewProducer,
    events: UnboundedSender<StatusEvent>,
    commands: Receiver<PumpCommand>,
    stop: Arc<AtomicBool>,

    session: Option<DeviceSession>,
    record_pacer: FramePacer,
    record_fps: u32,
    preview_pacer: FramePacer,
    last_flush: Instant,
    last_tick: Instant,
    shutting_down: bool,
}

impl FramePump {
    /// Spawn the capture thread and return its handle
    pub fn spawn(
        capture: Box<dyn CaptureBackend>,
        encoder: Box<dyn EncoderBackend>,
        shared: SharedHandle,
        preview: PreviewProducer,
        events: UnboundedSender<StatusEvent>,
    ) -> PumpHandle {
        let (tx, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("frame-pump".into())
            .spawn(move || {
                let mut pump = FramePump {
                    capture,
                    recorder: Recorder::new(encoder),
                    shared,
                    preview,
                    events,
                    commands: rx,
                    stop: thread_stop,
                    session: None,
                    record_pacer: FramePacer::for_rate(timing::DEFAULT_FPS),
                    record_fps: timing::DEFAULT_FPS,
                    preview_pacer: FramePacer::for_rate(preview_consts::TARGET_HZ),
                    last_flush: Instant::now(),
                    last_tick: Instant::now(),
                    shutting_down: false,
                };
                pump.run();
            })
            .unwrap_or_else(|e| {
                // Thread spawn only fails on resource exhaustion; nothing
                // sensible to recover to at that point
                panic!("failed to spawn capture thread: {e}")
            });

        PumpHandle {
            thread: Some(thread),
            commands: tx,
            stop,
        }
    }

    fn run(&mut self) {
        info!("Capture loop started");
        while self.live() {
            self.drain_commands();
            if !self.live() {
                break;
            }
            self.iterate();
        }
        self.teardown();
        info!("Capture loop exited");
    }

    /// Whether the loop should keep running
    fn live(&self) -> bool {
        !self.shutting_down && !self.stop.load(Ordering::Relaxed)
    }

    /// Handle all pending commands without blocking
    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty) => return,
                // Controller dropped; nothing left to serve
                Err(TryRecvError::Disconnected) => {
                    self.shutting_down = true;
                    return;
                }
            }
        }
    }

    fn handle_command(&mut self, command: PumpCommand) {
        match command {
            PumpCommand::StartRecording { dir, reply } => {
                let result = self.start_recording(&dir);
                let _ = reply.send(result);
            }
            PumpCommand::StopRecording { reply } => {
                let result = self.stop_recording();
                let _ = reply.send(result);
            }
            PumpCommand::Shutdown => self.shutting_down = true,
        }
    }

    /// One pass of the capture loop: bind, read, record, preview
    fn iterate(&mut self) {
        let config = self.shared.lock().unwrap().capture;

        // Rebind when the wanted device/resolution/fps changed out from
        // under the open session
        let needs_rebind = self
            .session
            .as_ref()
            .is_some_and(|s| !s.matches(&config) || self.record_fps != config.target_fps);
        if needs_rebind {
            debug!(device = config.device_id, resolution = %config.resolution,
                fps = config.target_fps, "Configuration changed, reopening device");
            self.session = None;
        }

        if self.session.is_none() {
            if let Err(e) = self.try_bind() {
                warn!(device = config.device_id, error = %e, "Could not open device");
                self.emit(StatusEvent::CaptureError {
                    message: e.to_string(),
                });
                self.backoff();
                return;
            }
        }

        let frame = match self.session.as_mut() {
            Some(session) => match session.read() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Frame read failed, closing device");
                    self.emit(StatusEvent::CaptureError {
                        message: e.to_string(),
                    });
                    self.session = None;
                    self.backoff();
                    return;
                }
            },
            None => return,
        };

        let now = Instant::now();

        if self.recorder.is_active() {
            if self.record_pacer.admit(now) {
                if let Err(failure) = self.recorder.write(&frame) {
                    // The recorder already tore the session down
                    self.shared.lock().unwrap().recording = false;
                    self.emit(StatusEvent::RecordingFailed {
                        message: failure.error.to_string(),
                        salvaged: failure.salvaged,
                    });
                }
            }
            self.maintain_recording(now);
        }

        if self.preview_pacer.admit(now) {
            let target = preview::preview_size(frame.resolution);
            self.preview.publish(preview::downscale(&frame, target));
        }
    }

    /// Open a device session for the current configuration
    fn try_bind(&mut self) -> Result<(), CaptureError> {
        let config = self.shared.lock().unwrap().capture;
        let session = DeviceSession::open(self.capture.as_ref(), &config)?;
        if session.resolution_differs() {
            self.emit(StatusEvent::ActualResolution {
                requested: session.requested_resolution(),
                actual: session.actual_resolution(),
            });
        }
        self.record_fps = config.target_fps;
        self.record_pacer = FramePacer::for_rate(config.target_fps);
        self.session = Some(session);
        Ok(())
    }

    fn start_recording(&mut self, dir: &std::path::Path) -> Result<StartedRecording, RecordingError> {
        if self.recorder.is_active() {
            return Err(RecordingError::AlreadyRecording);
        }

        // Recording needs an open device so the stream is sized to the
        // actual negotiated resolution. A failed bind here replies
        // immediately; the loop path owns the retry backoff.
        if self.session.is_none() {
            self.try_bind()
                .map_err(|e| RecordingError::StartFailed(e.to_string()))?;
        }
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| RecordingError::StartFailed("no capture device available".to_string()))?;

        let (codec, quality) = {
            let shared = self.shared.lock().unwrap();
            (shared.codec, shared.quality)
        };
        let profile =
            RecordingProfile::new(codec, quality, session.actual_resolution(), self.record_fps);

        let started = self.recorder.start(dir, &profile)?;
        self.shared.lock().unwrap().recording = true;
        self.record_pacer.reset();
        self.last_flush = Instant::now();
        self.last_tick = Instant::now();

        if let Some(from) = &started.fallback_from {
            self.emit(StatusEvent::CodecFallback {
                preferred: from.name,
                selected: started.codec.name,
            });
        }
        self.emit(StatusEvent::RecordingStarted {
            path: started.path.clone(),
            codec: started.codec.name,
            bitrate_kbps: started.bitrate_kbps,
        });
        Ok(started)
    }

    fn stop_recording(&mut self) -> Result<Option<FinalizedFile>, RecordingError> {
        let result = self.recorder.stop();
        self.shared.lock().unwrap().recording = false;
        match &result {
            Ok(Some(file)) => {
                self.emit(StatusEvent::RecordingStopped { file: file.clone() });
            }
            Ok(None) => {}
            Err(e) => {
                self.emit(StatusEvent::RecordingFailed {
                    message: e.to_string(),
                    salvaged: None,
                });
            }
        }
        result
    }

    /// Periodic flush and progress tick while a recording is open
    fn maintain_recording(&mut self, now: Instant) {
        if now.duration_since(self.last_flush) >= timing::SYNC_INTERVAL {
            self.recorder.flush();
            self.last_flush = now;
        }
        if now.duration_since(self.last_tick) >= timing::STATUS_TICK_INTERVAL {
            if let Some(elapsed) = self.recorder.elapsed() {
                self.emit(StatusEvent::RecordingTick {
                    elapsed,
                    frames: self.recorder.frames(),
                    size_bytes: self.recorder.current_size(),
                });
            }
            self.last_tick = now;
        }
    }

    /// Finalize any open recording before the thread exits
    fn teardown(&mut self) {
        if self.recorder.is_active() {
            info!("Finalizing recording before exit");
            if let Err(e) = self.stop_recording() {
                warn!(error = %e, "Recording did not finalize cleanly");
            }
        }
        self.session = None;
    }

    fn emit(&self, event: StatusEvent) {
        // Receiver gone just means nobody is listening anymore
        let _ = self.events.send(event);
    }

    /// Wait through the capture-error backoff, staying responsive to
    /// commands and the stop flag
    fn backoff(&mut self) {
        let deadline = Instant::now() + timing::CAPTURE_ERROR_BACKOFF;
        while self.live() && Instant::now() < deadline {
            match self.commands.recv_timeout(Duration::from_millis(50)) {
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.shutting_down = true,
            }
        }
    }
}
