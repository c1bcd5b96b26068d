// src/pipeline/orchestrator.rs
//
// Drives one session: boundary selection up front, then per frame
//   detections → containment → registry → entry check
//   known − active → disappearance check
// and finally the counts.
//
// Per-detection problems (non-finite centroid, duplicate ID in a frame) are
// logged and skipped. Producer and configuration failures end the session.

use super::event_bus::{EventBus, RenderEvent};
use super::frame_context::FrameContext;
use super::metrics::SessionMetrics;
use super::report::{BoundaryInfo, IdentityRecord, SessionReport};
use crate::analysis::{
    boundary_selector, BoundarySelection, Classification, DisappearanceVerdict,
    EvasionClassifier, EvasionMark, Observation, TrackRegistry,
};
use crate::error::EvasionError;
use crate::producer::{BoundarySource, DetectionSource};
use crate::types::{Config, EvasionConfig, FrameDetections, VideoMetadata};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Progress log cadence, in frames
const PROGRESS_EVERY_FRAMES: u64 = 300;

/// Query the segmenter's candidates, select the boundary and build the
/// orchestrator for one video.
pub fn open_session<B: BoundarySource + ?Sized>(
    config: &Config,
    metadata: VideoMetadata,
    boundary_source: &mut B,
) -> Result<SessionOrchestrator, EvasionError> {
    let candidates = boundary_source.candidates()?;
    let boundary = boundary_selector::select(candidates.first_frame, candidates.last_frame);

    let events = config
        .session
        .emit_render_events
        .then(|| EventBus::new(config.session.max_pending_events));

    SessionOrchestrator::new(&config.evasion, metadata, boundary, events)
}

pub struct SessionOrchestrator {
    metadata: VideoMetadata,
    boundary: Option<BoundarySelection>,
    registry: TrackRegistry,
    classifier: EvasionClassifier,
    metrics: SessionMetrics,
    marks: Vec<EvasionMark>,
    events: Option<EventBus>,
    last_frame_index: u64,
    last_active: HashSet<u32>,
    /// Tracks whose disappearance could not be evaluated; warned once each
    skipped_logged: HashSet<u32>,
    finalized: bool,
}

impl SessionOrchestrator {
    pub fn new(
        config: &EvasionConfig,
        metadata: VideoMetadata,
        boundary: Option<BoundarySelection>,
        mut events: Option<EventBus>,
    ) -> Result<Self, EvasionError> {
        let classifier = EvasionClassifier::new(config.clone(), metadata.fps)?;

        if let (Some(bus), Some(selection)) = (events.as_mut(), boundary.as_ref()) {
            bus.publish(RenderEvent::BoundarySelected {
                points: selection.polygon.points().to_vec(),
                origin: selection.origin,
            });
        }

        info!(
            "Session {}: {}x{} @ {:.2} FPS | proximity={:.0}px, min_time_outside={:.2}s{}",
            metadata.source,
            metadata.width,
            metadata.height,
            metadata.fps,
            config.proximity_threshold,
            config.min_time_outside,
            if boundary.is_none() { " | NO BOUNDARY" } else { "" }
        );

        Ok(Self {
            metadata,
            boundary,
            registry: TrackRegistry::new(),
            classifier,
            metrics: SessionMetrics::new(),
            marks: Vec::new(),
            events,
            last_frame_index: 0,
            last_active: HashSet::new(),
            skipped_logged: HashSet::new(),
            finalized: false,
        })
    }

    pub fn process_frame(&mut self, frame: &FrameDetections) -> Result<FrameContext, EvasionError> {
        let frame_index = frame.frame_index;
        if frame_index <= self.last_frame_index {
            return Err(EvasionError::producer(
                &self.metadata.source,
                frame_index,
                format!(
                    "frame index not increasing (previous frame was {})",
                    self.last_frame_index
                ),
            ));
        }
        self.last_frame_index = frame_index;
        self.metrics.total_frames += 1;

        let mut ctx = FrameContext::new(frame_index);
        // IDs already recorded this frame; malformed copies never claim one
        let mut recorded = HashSet::with_capacity(frame.detections.len());

        for det in &frame.detections {
            self.metrics.detections_seen += 1;
            ctx.active_ids.insert(det.track_id);

            if !det.centroid.is_finite() {
                warn!(
                    "Track {} has a non-finite centroid ({}, {}) in F{}, skipped",
                    det.track_id, det.centroid.x, det.centroid.y, frame_index
                );
                ctx.skipped_detections += 1;
                continue;
            }
            if !recorded.insert(det.track_id) {
                warn!(
                    "Track {} appears twice in F{}, keeping the first valid detection",
                    det.track_id, frame_index
                );
                ctx.skipped_detections += 1;
                continue;
            }

            let contained = self
                .boundary
                .as_ref()
                .is_some_and(|b| b.polygon.contains(&det.centroid));

            let observation = self
                .registry
                .observe(det.track_id, det.centroid, frame_index, contained);

            // Entry can only happen on an outside → inside step
            if let Observation::Tracked {
                was_contained: false,
                contained: true,
            } = observation
            {
                let mark = self
                    .registry
                    .get(det.track_id)
                    .and_then(|identity| self.classifier.evaluate_entry(identity, frame_index));
                if let Some(mark) = mark {
                    self.apply_mark(mark, &mut ctx);
                }
            }

            if let Some(bus) = self.events.as_mut() {
                let trajectory_len = self
                    .registry
                    .get(det.track_id)
                    .map_or(0, |identity| identity.positions().len());
                bus.publish(RenderEvent::IdentityObserved {
                    frame_index,
                    track_id: det.track_id,
                    centroid: det.centroid,
                    confidence: det.confidence,
                    contained,
                    ignored: !matches!(observation, Observation::Tracked { .. }),
                    trajectory_len,
                });
            }
        }

        self.metrics.detections_skipped += ctx.skipped_detections as u64;

        let disappeared = self.registry.disappeared(&ctx.active_ids);
        for &track_id in &disappeared {
            self.evaluate_disappearance(track_id, frame_index, &mut ctx);
        }
        ctx.disappeared_ids = disappeared;

        if let Some(bus) = self.events.as_mut() {
            bus.publish(RenderEvent::FrameSummary {
                frame_index,
                evasion_count: self.metrics.evasion_count(),
            });
        }

        if self.metrics.total_frames % PROGRESS_EVERY_FRAMES == 0 {
            info!(
                "Frame {}: {} active, {} known identities, {} evasion(s) so far",
                frame_index,
                ctx.active_ids.len(),
                self.registry.len(),
                self.metrics.evasion_count()
            );
        }

        self.last_active = ctx.active_ids.clone();
        Ok(ctx)
    }

    fn evaluate_disappearance(&mut self, track_id: u32, frame_index: u64, ctx: &mut FrameContext) {
        let Some(identity) = self.registry.get(track_id) else {
            return;
        };
        if identity.classification() != Classification::Unresolved {
            return;
        }

        let Some(selection) = self.boundary.as_ref() else {
            // Without geometry a lost track can only be benign
            self.registry.classify(track_id, Classification::Benign);
            return;
        };

        let verdict = self
            .classifier
            .evaluate_disappearance(identity, &selection.polygon, frame_index);
        match verdict {
            DisappearanceVerdict::Evasion(mark) => self.apply_mark(mark, ctx),
            DisappearanceVerdict::Benign(reason) => {
                debug!(
                    "Track {} lost at F{}: benign ({})",
                    track_id, frame_index, reason
                );
                self.registry.classify(track_id, Classification::Benign);
            }
            DisappearanceVerdict::Skipped(reason) => {
                if self.skipped_logged.insert(track_id) {
                    warn!(
                        "Track {} disappearance at F{} not evaluated: {}",
                        track_id, frame_index, reason
                    );
                }
            }
            DisappearanceVerdict::NotApplicable => {}
        }
    }

    fn apply_mark(&mut self, mark: EvasionMark, ctx: &mut FrameContext) {
        if !self
            .registry
            .classify(mark.track_id, mark.kind.classification())
        {
            return;
        }

        self.metrics.record_evasion(mark.kind);
        info!(
            "🚨 EVASION ({}): Track {} at F{} ({:.0}, {:.0}) after {:.1}s{} | total={}",
            mark.kind.as_str(),
            mark.track_id,
            mark.frame_index,
            mark.point.x,
            mark.point.y,
            mark.elapsed_secs,
            mark.boundary_distance
                .map(|d| format!(", {:.1}px from boundary", d))
                .unwrap_or_default(),
            self.metrics.evasion_count()
        );

        if let Some(bus) = self.events.as_mut() {
            bus.publish(RenderEvent::EvasionMarked(mark.clone()));
        }
        ctx.new_marks.push(mark.clone());
        self.marks.push(mark);
    }

    pub fn drain_events(&mut self) -> Vec<RenderEvent> {
        self.events.as_mut().map(EventBus::drain).unwrap_or_default()
    }

    /// Close the session. Tracks still active stay unresolved unless
    /// `finalize_active_tracks` asks for one last disappearance check.
    /// Calling it twice returns the same counts.
    pub fn finalize(&mut self, cancelled: bool) -> SessionReport {
        if !self.finalized {
            self.finalized = true;

            if self.classifier.config().finalize_active_tracks {
                let frame_index = self.last_frame_index;
                let mut ctx = FrameContext::new(frame_index);
                let mut active: Vec<u32> = self.last_active.iter().copied().collect();
                active.sort_unstable();
                for track_id in active {
                    let eligible = self
                        .registry
                        .get(track_id)
                        .is_some_and(|identity| !identity.ignored);
                    if eligible {
                        self.evaluate_disappearance(track_id, frame_index, &mut ctx);
                    }
                }
                if !ctx.new_marks.is_empty() {
                    info!(
                        "Finalization flagged {} still-active track(s)",
                        ctx.new_marks.len()
                    );
                }
            }

            if let Some(bus) = self.events.as_ref() {
                if bus.dropped_count() > 0 {
                    warn!(
                        "{} render event(s) were dropped, overlay is incomplete",
                        bus.dropped_count()
                    );
                }
            }
        }

        self.build_report(cancelled)
    }

    fn build_report(&self, cancelled: bool) -> SessionReport {
        let counts = self.registry.counts();

        SessionReport {
            source: self.metadata.source.clone(),
            fps: self.metadata.fps,
            width: self.metadata.width,
            height: self.metadata.height,
            frames_processed: self.metrics.total_frames,
            detections_seen: self.metrics.detections_seen,
            detections_skipped: self.metrics.detections_skipped,
            boundary: self.boundary.as_ref().map(BoundaryInfo::from),
            summary: self.metrics.summary(&counts),
            marks: self.marks.clone(),
            identities: self.registry.identities().map(IdentityRecord::from).collect(),
            cancelled,
            processing_fps: self.metrics.fps(),
        }
    }

    /// Consume frames until the stream ends or `stop` is raised, handing
    /// render events to `sink` after every frame.
    pub fn run<S, F>(
        mut self,
        source: &mut S,
        stop: &AtomicBool,
        mut sink: F,
    ) -> Result<SessionReport, EvasionError>
    where
        S: DetectionSource + ?Sized,
        F: FnMut(Vec<RenderEvent>),
    {
        let mut cancelled = false;

        loop {
            if stop.load(Ordering::Relaxed) {
                warn!(
                    "⏹️  Stop requested after {} frames, finalizing session",
                    self.metrics.total_frames
                );
                cancelled = true;
                break;
            }

            let Some(frame) = source.next_frame()? else {
                break;
            };
            let ctx = self.process_frame(&frame)?;
            if ctx.has_evasion() {
                debug!(
                    "F{}: {} new evasion(s), {} lost track(s)",
                    ctx.frame_index,
                    ctx.new_marks.len(),
                    ctx.disappeared_ids.len()
                );
            }

            self.flush_events(&mut sink);
        }

        let report = self.finalize(cancelled);
        self.flush_events(&mut sink);
        Ok(report)
    }

    fn flush_events<F: FnMut(Vec<RenderEvent>)>(&mut self, sink: &mut F) {
        let pending = self
            .events
            .as_ref()
            .is_some_and(|bus| bus.pending_count() > 0);
        if pending {
            sink(self.drain_events());
        }
    }
}
