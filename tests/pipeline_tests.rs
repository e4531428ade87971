// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests with the synthetic camera and the MJPEG/AVI
//! encoder: real frames through the pump, real container bytes on disk.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use webcam_recorder::backends::camera::synthetic::SyntheticBackend;
use webcam_recorder::media::encoders::mjpeg_avi::MjpegAviEncoder;
use webcam_recorder::{
    CaptureConfig, Fourcc, QualityPreset, Resolution, SessionController, StatusEvent,
};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let dir = std::env::temp_dir().join(format!(
        "pipeline-test-{}-{}-{}",
        name,
        std::process::id(),
        nanos
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn config(fps: u32) -> CaptureConfig {
    CaptureConfig {
        device_id: 0,
        resolution: Resolution::new(160, 120),
        target_fps: fps,
    }
}

#[test]
fn records_a_playable_avi_at_the_paced_rate() {
    let dir = temp_dir("avi");
    let backend = SyntheticBackend::new().with_native_fps(60);
    let (controller, _preview, _events) = SessionController::new(
        Box::new(backend),
        Box::new(MjpegAviEncoder::new()),
        config(15),
        Fourcc::new(b"MJPG"),
        QualityPreset::Medium,
    );

    let started = controller.start_recording(&dir).unwrap();
    assert!(started.path.extension().is_some_and(|e| e == "avi"));
    assert!(started.fallback_from.is_none());

    std::thread::sleep(Duration::from_millis(1500));
    let file = controller.stop_recording().unwrap().unwrap();
    controller.shutdown();

    // 60 Hz capture paced to 15 fps over ~1.5 s
    assert!(file.frames >= 10, "only {} frames recorded", file.frames);
    assert!(file.frames <= 35, "{} frames exceeds pacing", file.frames);
    assert!(file.size_bytes >= 2048);

    let bytes = std::fs::read(&file.path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"AVI ");
    // RIFF size field covers the whole file minus the 8-byte preamble
    let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(riff_size as usize, bytes.len() - 8);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn preferred_mp4_codec_falls_back_to_avi_with_one_notice() {
    let dir = temp_dir("fallback");
    let (controller, _preview, mut events) = SessionController::new(
        Box::new(SyntheticBackend::new().with_native_fps(60)),
        Box::new(MjpegAviEncoder::new()),
        config(30),
        Fourcc::new(b"avc1"),
        QualityPreset::Medium,
    );

    let started = controller.start_recording(&dir).unwrap();
    assert_eq!(started.codec.fourcc, Fourcc::new(b"MJPG"));
    assert_eq!(started.fallback_from.unwrap().fourcc, Fourcc::new(b"avc1"));

    std::thread::sleep(Duration::from_millis(300));
    controller.stop_recording().unwrap();
    controller.shutdown();

    let mut fallback_notices = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, StatusEvent::CodecFallback { .. }) {
            fallback_notices += 1;
        }
    }
    assert_eq!(fallback_notices, 1);

    // Only the selected candidate's file exists; failed candidates left
    // nothing behind
    let files: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].extension().is_some_and(|e| e == "avi"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn at_most_one_device_session_across_a_config_switch() {
    let backend = SyntheticBackend::new()
        .with_native_fps(120)
        .with_device_count(2);
    let open = backend.open_sources();
    let total = backend.total_opens();

    let (controller, preview, _events) = SessionController::new(
        Box::new(backend),
        Box::new(MjpegAviEncoder::new()),
        config(30),
        Fourcc::new(b"MJPG"),
        QualityPreset::Medium,
    );

    // Wait for the first session to come up
    let mut waited = 0;
    while preview.take().is_none() && waited < 50 {
        std::thread::sleep(Duration::from_millis(50));
        waited += 1;
    }
    assert_eq!(open.load(Ordering::SeqCst), 1);

    controller.set_camera(1);
    std::thread::sleep(Duration::from_millis(500));

    // The switch reopened exactly once and never ran two sessions at once
    assert_eq!(open.load(Ordering::SeqCst), 1);
    assert_eq!(total.load(Ordering::SeqCst), 2);

    controller.shutdown();
    assert_eq!(open.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_is_idempotent_and_records_can_restart() {
    let dir = temp_dir("restart");
    let (controller, _preview, _events) = SessionController::new(
        Box::new(SyntheticBackend::new().with_native_fps(60)),
        Box::new(MjpegAviEncoder::new()),
        config(30),
        Fourcc::new(b"MJPG"),
        QualityPreset::Medium,
    );

    controller.start_recording(&dir).unwrap();
    std::thread::sleep(Duration::from_millis(400));
    assert!(controller.stop_recording().unwrap().is_some());
    assert!(controller.stop_recording().unwrap().is_none());

    // A fresh session starts cleanly after the previous one finalized
    controller.start_recording(&dir).unwrap();
    std::thread::sleep(Duration::from_millis(400));
    assert!(controller.stop_recording().unwrap().is_some());
    controller.shutdown();

    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn recorder_uses_the_negotiated_resolution() {
    let dir = temp_dir("negotiated");
    let actual = Resolution::new(320, 240);
    let backend = SyntheticBackend::new()
        .with_native_fps(60)
        .with_forced_resolution(actual);

    let (controller, _preview, mut events) = SessionController::new(
        Box::new(backend),
        Box::new(MjpegAviEncoder::new()),
        CaptureConfig {
            device_id: 0,
            resolution: Resolution::new(1280, 720),
            target_fps: 30,
        },
        Fourcc::new(b"MJPG"),
        QualityPreset::Medium,
    );

    controller.start_recording(&dir).unwrap();
    std::thread::sleep(Duration::from_millis(500));
    let file = controller.stop_recording().unwrap().unwrap();
    controller.shutdown();

    let mut saw_resolution_notice = false;
    while let Ok(event) = events.try_recv() {
        if let StatusEvent::ActualResolution {
            actual: reported, ..
        } = event
        {
            assert_eq!(reported, actual);
            saw_resolution_notice = true;
        }
    }
    assert!(saw_resolution_notice);

    // The AVI header carries the actual frame size, not the requested one
    let bytes = std::fs::read(&file.path).unwrap();
    let width = u32::from_le_bytes(bytes[64..68].try_into().unwrap());
    let height = u32::from_le_bytes(bytes[68..72].try_into().unwrap());
    assert_eq!((width, height), (actual.width, actual.height));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn preview_keeps_flowing_while_recording() {
    let dir = temp_dir("preview");
    let (controller, preview, _events) = SessionController::new(
        Box::new(SyntheticBackend::new().with_native_fps(60)),
        Box::new(MjpegAviEncoder::new()),
        config(30),
        Fourcc::new(b"MJPG"),
        QualityPreset::Medium,
    );

    controller.start_recording(&dir).unwrap();

    let mut frames_seen = 0;
    for _ in 0..20 {
        if preview.take().is_some() {
            frames_seen += 1;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(frames_seen >= 3, "only {} preview frames", frames_seen);

    controller.stop_recording().unwrap();
    controller.shutdown();
    std::fs::remove_dir_all(&dir).unwrap();
}
