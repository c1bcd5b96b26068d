// src/pipeline/event_bus.rs
//
// Side channel for renderers. The orchestrator publishes what it decided;
// whoever draws overlays drains the bus. Counting never depends on it.

use crate::analysis::{CandidateOrigin, EvasionMark};
use crate::types::Point;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenderEvent {
    BoundarySelected {
        points: Vec<Point>,
        origin: CandidateOrigin,
    },

    IdentityObserved {
        frame_index: u64,
        track_id: u32,
        centroid: Point,
        confidence: f32,
        contained: bool,
        ignored: bool,
        trajectory_len: usize,
    },

    EvasionMarked(EvasionMark),

    FrameSummary {
        frame_index: u64,
        evasion_count: u64,
    },
}

pub struct EventBus {
    events: VecDeque<RenderEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: RenderEvent) {
        if self.events.len() >= self.max_pending {
            if self.dropped == 0 {
                warn!(
                    "Render event bus full ({} events), dropping oldest",
                    self.max_pending
                );
            }
            self.dropped += 1;
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<RenderEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
