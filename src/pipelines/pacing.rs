// SPDX-License-Identifier: GPL-3.0-only

//! Frame pacing
//!
//! Decides which frames pass a rate gate. Used twice by the pump: once to
//! decouple the encoded frame rate from the native capture rate, and once
//! for the preview cadence. Frames are dropped opportunistically, never
//! reordered or duplicated.

use std::time::{Duration, Instant};

/// Rate gate admitting at most one frame per interval
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl FramePacer {
    /// Pacer targeting the given rate; a zero rate admits every frame
    pub fn for_rate(fps: u32) -> Self {
        let interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / fps as f64)
        };
        Self {
            interval,
            next_due: None,
        }
    }

    /// Whether a frame observed at `now` passes the gate.
    ///
    /// The first frame always passes. Admission advances a deadline by one
    /// interval rather than stamping the arrival time, so arrivals landing
    /// short of the deadline accrue credit and the long-run rate converges
    /// on the target even when it is not a divisor of the native rate.
    pub fn admit(&mut self, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let due = due + self.interval;
                // More than a full interval behind: restart from now rather
                // than bursting to catch up
                self.next_due = Some(if due <= now { now } else { due });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }

    /// Forget pacing history, e.g. across a session rebind
    pub fn reset(&mut self) {
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_always_passes() {
        let mut pacer = FramePacer::for_rate(30);
        assert!(pacer.admit(Instant::now()));
    }

    #[test]
    fn admits_within_one_frame_of_target_rate() {
        // Native rate 120 Hz, target 30 Hz, simulated over 2 seconds
        let mut pacer = FramePacer::for_rate(30);
        let start = Instant::now();
        let native_step = Duration::from_secs_f64(1.0 / 120.0);
        let mut admitted = 0u32;
        for i in 0..240 {
            if pacer.admit(start + native_step * i) {
                admitted += 1;
            }
        }
        // 30 fps over 2 s is 60 frames; allow one frame of slack
        assert!((59..=61).contains(&admitted), "admitted {}", admitted);
    }

    #[test]
    fn converges_when_target_is_not_a_native_divisor() {
        // Native rate 60 Hz, target 24 fps (not a divisor), 5 seconds. A
        // gate that only measures elapsed-since-last-admit locks onto
        // 20 fps here; credit accrual keeps the long-run rate at 24.
        let mut pacer = FramePacer::for_rate(24);
        let start = Instant::now();
        let native_step = Duration::from_secs_f64(1.0 / 60.0);
        let admitted = (0..300)
            .filter(|&i| pacer.admit(start + native_step * i))
            .count();
        // 24 fps over 5 s is 120 frames; allow one frame of slack
        assert!((119..=121).contains(&admitted), "admitted {}", admitted);
    }

    #[test]
    fn target_above_native_rate_admits_everything() {
        let mut pacer = FramePacer::for_rate(60);
        let start = Instant::now();
        let native_step = Duration::from_secs_f64(1.0 / 30.0);
        let admitted = (0..30)
            .filter(|&i| pacer.admit(start + native_step * i))
            .count();
        assert_eq!(admitted, 30);
    }

    #[test]
    fn zero_rate_admits_everything() {
        let mut pacer = FramePacer::for_rate(0);
        let now = Instant::now();
        assert!(pacer.admit(now));
        assert!(pacer.admit(now));
    }

    #[test]
    fn reset_forgets_history() {
        let mut pacer = FramePacer::for_rate(1);
        let now = Instant::now();
        assert!(pacer.admit(now));
        assert!(!pacer.admit(now));
        pacer.reset();
        assert!(pacer.admit(now));
    }
}
