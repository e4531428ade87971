// SPDX-License-Identifier: GPL-3.0-only

//! Recorder: output stream lifecycle with codec fallback
//!
//! `start` probes the target directory, walks the codec candidates in
//! fallback order until one opens, and applies the bitrate hint. `write`
//! appends frames; a write failure tears the session down through the same
//! finalize-and-validate path as a normal stop.

use crate::backends::camera::types::{Frame, Resolution};
use crate::constants::{QualityPreset, target_bitrate_kbps};
use crate::errors::RecordingError;
use crate::media::codec::{CodecCandidate, Fourcc, ordered_candidates};
use crate::media::encoders::{EncoderBackend, EncoderSink};
use crate::storage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything fixed for the duration of one recording session
#[derive(Debug, Clone)]
pub struct RecordingProfile {
    /// Codec candidates, preference first, rest in fallback order
    pub candidates: Vec<CodecCandidate>,
    /// Quality preset scaling the base bitrate
    pub quality: QualityPreset,
    /// Stream resolution; the *actual* negotiated capture resolution
    pub resolution: Resolution,
    /// Encoded frame rate
    pub fps: u32,
}

impl RecordingProfile {
    pub fn new(
        preferred: Fourcc,
        quality: QualityPreset,
        resolution: Resolution,
        fps: u32,
    ) -> Self {
        Self {
            candidates: ordered_candidates(preferred),
            quality,
            resolution,
            fps,
        }
    }

    /// Bitrate hint for this profile in kbps
    pub fn bitrate_kbps(&self) -> u32 {
        target_bitrate_kbps(self.resolution, self.quality)
    }
}

/// Details of a session that just started
#[derive(Debug, Clone)]
pub struct StartedRecording {
    pub path: PathBuf,
    pub codec: CodecCandidate,
    /// Set when a fallback codec was substituted for the preference;
    /// carries the preferred candidate that failed to open
    pub fallback_from: Option<CodecCandidate>,
    pub bitrate_kbps: u32,
}

/// A finalized, validated output file
#[derive(Debug, Clone)]
pub struct FinalizedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub frames: u64,
    pub codec: CodecCandidate,
}

/// A failed frame write, paired with whatever the forced finalize salvaged
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub error: RecordingError,
    /// Present when the forced stop still finalized a valid output file
    pub salvaged: Option<FinalizedFile>,
}

/// One open recording session; exclusively owned by the recorder
struct RecordingSession {
    sink: Box<dyn EncoderSink>,
    path: PathBuf,
    codec: CodecCandidate,
    started_at: Instant,
    frames: u64,
}

/// Recording pipeline owner
pub struct Recorder {
    backend: Box<dyn EncoderBackend>,
    session: Option<RecordingSession>,
}

impl Recorder {
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Whether a session is open
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Frames written to the open session
    pub fn frames(&self) -> u64 {
        self.session.as_ref().map(|s| s.frames).unwrap_or(0)
    }

    /// Elapsed time of the open session
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        self.session.as_ref().map(|s| s.started_at.elapsed())
    }

    /// Current on-disk size of the open session's file
    pub fn current_size(&self) -> u64 {
        self.session
            .as_ref()
            .and_then(|s| std::fs::metadata(&s.path).ok())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Path of the open session's file
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Start a recording session into the given directory.
    ///
    /// Fails fast with `DirectoryNotWritable` before any encoder is opened,
    /// and with `NoCodecAvailable` when every candidate refuses. Starting
    /// while a session is open is `AlreadyRecording`; the open session is
    /// untouched.
    pub fn start(
        &mut self,
        dir: &Path,
        profile: &RecordingProfile,
    ) -> Result<StartedRecording, RecordingError> {
        if self.session.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        storage::probe_writable(dir)?;

        let stamp = storage::timestamp();
        let preferred = profile.candidates.first().copied();
        for candidate in &profile.candidates {
            let path = storage::output_path(dir, &stamp, candidate.extension);
            let Some(mut sink) =
                self.backend
                    .open(&path, candidate.fourcc, profile.fps, profile.resolution)
            else {
                debug!(codec = candidate.name, "Codec candidate did not open");
                continue;
            };

            // Best-effort hint; the sink may ignore it silently
            let bitrate_kbps = profile.bitrate_kbps();
            sink.set_bitrate_hint(bitrate_kbps);

            let fallback_from = match preferred {
                Some(p) if p.fourcc != candidate.fourcc => Some(p),
                _ => None,
            };
            if let Some(from) = &fallback_from {
                info!(preferred = from.name, selected = candidate.name,
                    "Preferred codec unavailable, fell back");
            }

            info!(path = %path.display(), codec = candidate.name, bitrate_kbps,
                resolution = %profile.resolution, fps = profile.fps, "Recording started");

            self.session = Some(RecordingSession {
                sink,
                path: path.clone(),
                codec: *candidate,
                started_at: Instant::now(),
                frames: 0,
            });
            return Ok(StartedRecording {
                path,
                codec: *candidate,
                fallback_from,
                bitrate_kbps,
            });
        }

        warn!(dir = %dir.display(), "No codec candidate could open an output stream");
        Err(RecordingError::NoCodecAvailable)
    }

    /// Append one frame to the open session.
    ///
    /// A write failure tears the session down immediately through the
    /// normal finalize-and-validate path; the failure carries whatever
    /// that finalize salvaged, so a file that was still valid at the point
    /// of failure is not silently lost. Writing with no session open is a
    /// no-op.
    pub fn write(&mut self, frame: &Frame) -> Result<(), WriteFailure> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        match session.sink.write(frame) {
            Ok(()) => {
                session.frames += 1;
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Frame write failed, stopping recording");
                let salvaged = match self.stop() {
                    Ok(file) => file,
                    Err(stop_err) => {
                        debug!(error = %stop_err, "Finalize after write failure also failed");
                        None
                    }
                };
                Err(WriteFailure { error, salvaged })
            }
        }
    }

    /// Best-effort durability flush of the open session
    pub fn flush(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.sink.flush();
        }
    }

    /// Stop and finalize the open session.
    ///
    /// Safe no-op returning `Ok(None)` when no session is open — no file
    /// operations, no error. Otherwise flush/close the stream and validate
    /// the file: missing -> `OutputMissing`, undersized -> deleted +
    /// `OutputTooSmall`, else the finalized file details.
    pub fn stop(&mut self) -> Result<Option<FinalizedFile>, RecordingError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };

        let RecordingSession {
            sink,
            path,
            codec,
            started_at,
            frames,
        } = session;

        sink.finish()?;
        let size_bytes = storage::validate_output(&path)?;

        info!(path = %path.display(), size_bytes, frames,
            elapsed_secs = started_at.elapsed().as_secs(), "Recording finalized");
        Ok(Some(FinalizedFile {
            path,
            size_bytes,
            frames,
            codec,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::codec::CODEC_CANDIDATES;
    use crate::media::encoders::synthetic::ScriptedEncoder;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MJPG: Fourcc = Fourcc::new(b"MJPG");
    const AVC1: Fourcc = Fourcc::new(b"avc1");

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos();
        let dir = std::env::temp_dir().join(format!(
            "recorder-test-{}-{}-{}",
            name,
            std::process::id(),
            nanos
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn profile(preferred: Fourcc) -> RecordingProfile {
        RecordingProfile::new(preferred, QualityPreset::Medium, Resolution::new(64, 48), 30)
    }

    fn frame() -> Frame {
        let res = Resolution::new(64, 48);
        Frame::new(vec![9; res.rgb_len()], res).unwrap()
    }

    #[test]
    fn fallback_selects_first_available_candidate() {
        let dir = temp_dir("fallback");
        let backend = ScriptedEncoder::accepting(&[MJPG]);
        let attempted = backend.attempted();
        let mut recorder = Recorder::new(Box::new(backend));

        let started = recorder.start(&dir, &profile(AVC1)).unwrap();
        assert_eq!(started.codec.fourcc, MJPG);
        // Exactly one fallback notice, naming the preference
        assert_eq!(started.fallback_from.unwrap().fourcc, AVC1);
        // Candidates before MJPG were each tried once, in order
        let attempts = attempted.lock().unwrap().clone();
        assert_eq!(attempts[0], AVC1);
        assert_eq!(*attempts.last().unwrap(), MJPG);
        // No stray file from failed candidates
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        recorder.stop().ok();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn preferred_codec_produces_no_fallback_notice() {
        let dir = temp_dir("preferred");
        let mut recorder = Recorder::new(Box::new(ScriptedEncoder::accepting(&[MJPG])));
        let started = recorder.start(&dir, &profile(MJPG)).unwrap();
        assert!(started.fallback_from.is_none());
        recorder.stop().ok();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_candidate_available_aborts_start() {
        let dir = temp_dir("nocodec");
        let backend = ScriptedEncoder::accepting(&[]);
        let attempted = backend.attempted();
        let mut recorder = Recorder::new(Box::new(backend));

        let err = recorder.start(&dir, &profile(AVC1)).unwrap_err();
        assert!(matches!(err, RecordingError::NoCodecAvailable));
        assert!(!recorder.is_active());
        assert_eq!(attempted.lock().unwrap().len(), CODEC_CANDIDATES.len());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_directory_fails_before_any_encoder_open() {
        let backend = ScriptedEncoder::accepting(&[MJPG]);
        let attempted = backend.attempted();
        let mut recorder = Recorder::new(Box::new(backend));

        let missing = std::env::temp_dir().join("recorder-test-no-such-dir");
        let err = recorder.start(&missing, &profile(MJPG)).unwrap_err();
        assert!(matches!(err, RecordingError::DirectoryNotWritable(_)));
        assert!(attempted.lock().unwrap().is_empty());
    }

    #[test]
    fn double_start_is_rejected_and_session_kept() {
        let dir = temp_dir("double");
        let mut recorder = Recorder::new(Box::new(ScriptedEncoder::accepting(&[MJPG])));
        recorder.start(&dir, &profile(MJPG)).unwrap();
        let err = recorder.start(&dir, &profile(MJPG)).unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyRecording));
        assert!(recorder.is_active());
        recorder.stop().ok();
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stop_when_idle_is_a_safe_noop() {
        let mut recorder = Recorder::new(Box::new(ScriptedEncoder::accepting(&[MJPG])));
        assert!(recorder.stop().unwrap().is_none());
        // Still a no-op a second time
        assert!(recorder.stop().unwrap().is_none());
    }

    #[test]
    fn zero_byte_output_is_removed_on_stop() {
        let dir = temp_dir("zerobyte");
        let backend = ScriptedEncoder::accepting(&[MJPG]).with_zero_byte_output();
        let mut recorder = Recorder::new(Box::new(backend));

        recorder.start(&dir, &profile(MJPG)).unwrap();
        recorder.write(&frame()).unwrap();
        let err = recorder.stop().unwrap_err();
        assert!(matches!(err, RecordingError::OutputTooSmall { .. }));
        // No surviving file on disk
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn write_failure_forces_immediate_stop() {
        let dir = temp_dir("writefail");
        let backend = ScriptedEncoder::accepting(&[MJPG]).with_write_failure_after(2);
        let mut recorder = Recorder::new(Box::new(backend));

        recorder.start(&dir, &profile(MJPG)).unwrap();
        recorder.write(&frame()).unwrap();
        recorder.write(&frame()).unwrap();
        let failure = recorder.write(&frame()).unwrap_err();
        assert!(matches!(failure.error, RecordingError::EncodeWriteFailed(_)));
        // The two frames already on disk finalized into a valid file, and
        // the failure reports it rather than losing it
        let salvaged = failure.salvaged.unwrap();
        assert_eq!(salvaged.frames, 2);
        assert!(salvaged.path.exists());
        // Session was torn down, further stops are no-ops
        assert!(!recorder.is_active());
        assert!(recorder.stop().unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn write_failure_with_invalid_output_salvages_nothing() {
        let dir = temp_dir("writefail-empty");
        let backend = ScriptedEncoder::accepting(&[MJPG])
            .with_zero_byte_output()
            .with_write_failure_after(1);
        let mut recorder = Recorder::new(Box::new(backend));

        recorder.start(&dir, &profile(MJPG)).unwrap();
        recorder.write(&frame()).unwrap();
        let failure = recorder.write(&frame()).unwrap_err();
        assert!(matches!(failure.error, RecordingError::EncodeWriteFailed(_)));
        // The zero-byte file failed validation and was removed
        assert!(failure.salvaged.is_none());
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn frame_counter_tracks_writes() {
        let dir = temp_dir("frames");
        let mut recorder = Recorder::new(Box::new(ScriptedEncoder::accepting(&[MJPG])));
        recorder.start(&dir, &profile(MJPG)).unwrap();
        for _ in 0..5 {
            recorder.write(&frame()).unwrap();
        }
        assert_eq!(recorder.frames(), 5);
        // 5 raw 64x48 frames comfortably clear the integrity threshold
        let finalized = recorder.stop().unwrap().unwrap();
        assert_eq!(finalized.frames, 5);
        assert!(finalized.size_bytes >= 2048);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
