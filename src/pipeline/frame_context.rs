// src/pipeline/frame_context.rs
//
// Everything the orchestrator decided for one frame.

use crate::analysis::EvasionMark;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct FrameContext {
    pub frame_index: u64,
    /// Track IDs present in this frame, malformed detections included
    pub active_ids: HashSet<u32>,
    /// Tracks that were known but absent in this frame
    pub disappeared_ids: Vec<u32>,
    /// Evasions flagged in this frame
    pub new_marks: Vec<EvasionMark>,
    pub skipped_detections: usize,
}

impl FrameContext {
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            ..Self::default()
        }
    }

    pub fn has_evasion(&self) -> bool {
        !self.new_marks.is_empty()
    }
}
