// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for webcam operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Recording video with live status output

use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;
use webcam_recorder::backends::camera::CaptureBackend;
use webcam_recorder::backends::camera::synthetic::SyntheticBackend;
use webcam_recorder::media::encoders::mjpeg_avi::MjpegAviEncoder;
use webcam_recorder::{
    CaptureConfig, QualityPreset, RecorderPrefs, Resolution, SessionController, StatusEvent,
};

/// Pick the capture backend for the current platform
fn capture_backend(synthetic: bool) -> Box<dyn CaptureBackend> {
    if synthetic {
        return Box::new(SyntheticBackend::new());
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(webcam_recorder::backends::camera::v4l2::V4l2Backend::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        warn!("No native capture backend on this platform, using synthetic frames");
        Box::new(SyntheticBackend::new())
    }
}

/// List all available cameras
pub fn list_cameras(synthetic: bool) -> Result<(), Box<dyn std::error::Error>> {
    let backend = capture_backend(synthetic);
    let cameras = backend.enumerate();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    for camera in &cameras {
        println!(
            "  [{}] {} ({})",
            camera.index,
            camera.name,
            camera.path.display()
        );
    }
    Ok(())
}

/// Overrides for the recording session, each falling back to the persisted
/// preference when absent
pub struct RecordArgs {
    pub camera: Option<u32>,
    pub resolution: Option<Resolution>,
    pub fps: Option<u32>,
    pub codec: Option<String>,
    pub quality: Option<QualityPreset>,
    pub duration: Option<u64>,
    pub output: Option<PathBuf>,
    pub synthetic: bool,
}

/// Record a video until Ctrl-C or the duration limit
pub fn record_video(args: RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let prefs_path = RecorderPrefs::default_path();
    let mut prefs = prefs_path
        .as_deref()
        .map(RecorderPrefs::load_or_default)
        .unwrap_or_default();

    if let Some(camera) = args.camera {
        prefs.device_id = camera;
    }
    if let Some(resolution) = args.resolution {
        prefs.resolution = resolution;
    }
    if let Some(fps) = args.fps {
        prefs.fps = fps;
    }
    if let Some(codec) = &args.codec {
        prefs.codec = codec.clone();
    }
    if let Some(quality) = args.quality {
        prefs.quality = quality;
    }

    let output_dir = args
        .output
        .or_else(|| prefs.output_dir.clone())
        .or_else(|| dirs::video_dir().map(|d| d.join("webcam-recorder")))
        .ok_or("no output directory available; pass --output")?;
    std::fs::create_dir_all(&output_dir)?;

    let config = CaptureConfig {
        device_id: prefs.device_id,
        resolution: prefs.resolution,
        target_fps: prefs.fps,
    };

    let (controller, _preview, mut events) = SessionController::new(
        capture_backend(args.synthetic),
        Box::new(MjpegAviEncoder::new()),
        config,
        prefs.codec_fourcc(),
        prefs.quality,
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::Relaxed);
    })?;

    let started = controller.start_recording(&output_dir)?;
    println!(
        "Recording to {} ({}, {} kbps). Press Ctrl-C to stop.",
        started.path.display(),
        started.codec.name,
        started.bitrate_kbps
    );

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    while running.load(Ordering::Relaxed) {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    match controller.stop_recording()? {
        Some(file) => {
            println!(
                "Saved {} ({} frames, {} bytes) at {}",
                file.path.display(),
                file.frames,
                file.size_bytes,
                Local::now().format("%H:%M:%S")
            );
        }
        None => println!("Recording ended without output."),
    }
    controller.shutdown();

    prefs.output_dir = Some(output_dir);
    if let Some(path) = prefs_path {
        if let Err(e) = prefs.save(&path) {
            warn!(error = %e, "Could not persist preferences");
        }
    }
    Ok(())
}

fn print_event(event: &StatusEvent) {
    match event {
        StatusEvent::CaptureError { message } => {
            eprintln!("Capture error: {message} (retrying)");
        }
        StatusEvent::ActualResolution { requested, actual } => {
            println!("Device negotiated {actual} instead of {requested}");
        }
        StatusEvent::CodecFallback {
            preferred,
            selected,
        } => {
            println!("Codec {preferred} unavailable, using {selected}");
        }
        StatusEvent::RecordingStarted { .. } => {}
        StatusEvent::RecordingTick {
            elapsed,
            frames,
            size_bytes,
        } => {
            println!(
                "  {:>4}s  {} frames  {} KiB",
                elapsed.as_secs(),
                frames,
                size_bytes / 1024
            );
        }
        StatusEvent::RecordingStopped { .. } => {}
        StatusEvent::RecordingFailed { message, salvaged } => {
            eprintln!("Recording failed: {message}");
            if let Some(file) = salvaged {
                eprintln!(
                    "Partial recording kept at {} ({} frames, {} bytes)",
                    file.path.display(),
                    file.frames,
                    file.size_bytes
                );
            }
        }
    }
}
