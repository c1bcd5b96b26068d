// src/pipeline/metrics.rs
//
// Per-session counters. Evasion counters are bumped exactly once per
// identity, when the registry accepts the classification.

use crate::analysis::{ClassificationCounts, EvasionKind};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub total_frames: u64,
    pub detections_seen: u64,
    pub detections_skipped: u64,
    pub entry_count: u64,
    pub disappearance_count: u64,
    /// Identities that crossed into the boundary after the dwell time.
    /// Fires together with `entry_count`.
    pub entered_count: u64,
    pub started_at: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            detections_seen: 0,
            detections_skipped: 0,
            entry_count: 0,
            disappearance_count: 0,
            entered_count: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_evasion(&mut self, kind: EvasionKind) {
        match kind {
            EvasionKind::Entry => {
                self.entry_count += 1;
                self.entered_count += 1;
            }
            EvasionKind::Disappearance => self.disappearance_count += 1,
        }
    }

    pub fn evasion_count(&self) -> u64 {
        self.entry_count + self.disappearance_count
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.total_frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self, counts: &ClassificationCounts) -> EvasionSummary {
        EvasionSummary {
            evasion_count: self.evasion_count(),
            case1_count: self.entry_count,
            case2_count: self.disappearance_count,
            entered_count: self.entered_count,
            ignored_count: counts.ignored as u64,
            tracked_count: counts.total() as u64,
            benign_count: counts.benign as u64,
            unresolved_count: counts.unresolved as u64,
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvasionSummary {
    pub evasion_count: u64,
    /// Entry evasions
    pub case1_count: u64,
    /// Disappearance evasions
    pub case2_count: u64,
    pub entered_count: u64,
    pub ignored_count: u64,
    /// Every identity observed in the session, ignored ones included
    pub tracked_count: u64,
    pub benign_count: u64,
    pub unresolved_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_bumps_entered_too() {
        let mut metrics = SessionMetrics::new();
        metrics.record_evasion(EvasionKind::Entry);
        metrics.record_evasion(EvasionKind::Disappearance);
        metrics.record_evasion(EvasionKind::Disappearance);

        let counts = ClassificationCounts {
            unresolved: 1,
            ignored: 2,
            entry_evasion: 1,
            disappearance_evasion: 2,
            benign: 3,
        };
        let summary = metrics.summary(&counts);
        assert_eq!(summary.evasion_count, 3);
        assert_eq!(summary.case1_count, 1);
        assert_eq!(summary.case2_count, 2);
        assert_eq!(summary.entered_count, 1);
        assert_eq!(summary.ignored_count, 2);
        assert_eq!(summary.tracked_count, 9);
        assert_eq!(summary.benign_count, 3);
        assert_eq!(summary.unresolved_count, 1);
    }
}
