// src/replay_source.rs
//
// Replays detector/tracker and segmentation output recorded next to each
// video:
//
//   <name>.detections.jsonl   header line, then one frame per line
//   <name>.boundary.json      {"first": [[x, y], ...] | null, "last": ...}

use crate::error::EvasionError;
use crate::producer::{BoundaryCandidates, BoundarySource, DetectionSource};
use crate::types::{Detection, FrameDetections, Point, VideoMetadata};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const DETECTIONS_SUFFIX: &str = ".detections.jsonl";
const BOUNDARY_SUFFIX: &str = ".boundary.json";

// ============================================================================
// SESSION DISCOVERY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SessionFiles {
    pub name: String,
    pub detections: PathBuf,
    pub boundary: PathBuf,
}

pub fn find_sessions(input_dir: impl AsRef<Path>) -> Vec<SessionFiles> {
    let mut sessions = Vec::new();

    for entry in WalkDir::new(input_dir.as_ref())
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if let Some(name) = file_name.strip_suffix(DETECTIONS_SUFFIX) {
            if name.is_empty() {
                continue;
            }
            sessions.push(SessionFiles {
                name: name.to_string(),
                detections: path.to_path_buf(),
                boundary: path.with_file_name(format!("{}{}", name, BOUNDARY_SUFFIX)),
            });
        }
    }

    sessions.sort_by(|a, b| a.detections.cmp(&b.detections));
    info!("Found {} recorded sessions", sessions.len());
    sessions
}

// ============================================================================
// DETECTIONS
// ============================================================================

#[derive(Deserialize)]
struct RawFrame {
    frame: Option<u64>,
    detections: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    id: u32,
    /// x1, y1, x2, y2
    bbox: Option<[f32; 4]>,
    centroid: Option<[f32; 2]>,
    confidence: f32,
}

impl RawDetection {
    /// Box center truncated to whole pixels
    fn centroid(&self) -> Option<Point> {
        if let Some([x1, y1, x2, y2]) = self.bbox {
            return Some(Point::new(((x1 + x2) / 2.0).trunc(), ((y1 + y2) / 2.0).trunc()));
        }
        self.centroid.map(Point::from)
    }
}

pub struct ReplayDetectionSource {
    label: String,
    metadata: VideoMetadata,
    lines: Lines<BufReader<File>>,
    last_frame_index: u64,
    min_confidence: f32,
    frames_read: u64,
}

impl ReplayDetectionSource {
    pub fn open(path: impl AsRef<Path>, min_confidence: f32) -> Result<Self, EvasionError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        info!("Opening detection stream: {}", label);

        let file = File::open(path).map_err(|e| EvasionError::producer(&label, 0, e.to_string()))?;
        let mut lines = BufReader::new(file).lines();

        let header = loop {
            match lines.next() {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => break line,
                Some(Err(e)) => return Err(EvasionError::producer(&label, 0, e.to_string())),
                None => return Err(EvasionError::producer(&label, 0, "missing header line")),
            }
        };
        let metadata: VideoMetadata = serde_json::from_str(&header)
            .map_err(|e| EvasionError::producer(&label, 0, format!("bad header: {}", e)))?;

        if !(metadata.fps.is_finite() && metadata.fps > 0.0) {
            return Err(EvasionError::producer(
                &label,
                0,
                format!("frame rate must be positive, got {}", metadata.fps),
            ));
        }

        info!(
            "   {}x{} @ {:.1} fps (source: {})",
            metadata.width, metadata.height, metadata.fps, metadata.source
        );

        Ok(Self {
            label,
            metadata,
            lines,
            last_frame_index: 0,
            min_confidence,
            frames_read: 0,
        })
    }
}

impl DetectionSource for ReplayDetectionSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<FrameDetections>, EvasionError> {
        let Some(expected) = self.last_frame_index.checked_add(1) else {
            return Err(EvasionError::producer(
                &self.label,
                self.last_frame_index,
                "frame index overflow",
            ));
        };

        let line = loop {
            match self.lines.next() {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => break line,
                Some(Err(e)) => {
                    return Err(EvasionError::producer(&self.label, expected, e.to_string()))
                }
                None => return Ok(None),
            }
        };

        let raw: RawFrame = serde_json::from_str(&line)
            .map_err(|e| EvasionError::producer(&self.label, expected, e.to_string()))?;
        let frame_index = raw.frame.unwrap_or(expected);

        let mut detections = Vec::with_capacity(raw.detections.len());
        for det in &raw.detections {
            if det.confidence < self.min_confidence {
                continue;
            }
            let centroid = det.centroid().ok_or_else(|| {
                EvasionError::producer(
                    &self.label,
                    frame_index,
                    format!("detection {} has neither bbox nor centroid", det.id),
                )
            })?;
            detections.push(Detection {
                track_id: det.id,
                centroid,
                confidence: det.confidence,
            });
        }

        self.last_frame_index = frame_index;
        self.frames_read += 1;

        Ok(Some(FrameDetections {
            frame_index,
            detections,
        }))
    }
}

impl Drop for ReplayDetectionSource {
    fn drop(&mut self) {
        debug!(
            "Released detection stream {} after {} frames",
            self.label, self.frames_read
        );
    }
}

// ============================================================================
// BOUNDARY
// ============================================================================

#[derive(Deserialize)]
struct RawBoundary {
    #[serde(default)]
    first: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    last: Option<Vec<[f32; 2]>>,
}

pub struct ReplayBoundarySource {
    path: PathBuf,
}

impl ReplayBoundarySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BoundarySource for ReplayBoundarySource {
    fn candidates(&mut self) -> Result<BoundaryCandidates, EvasionError> {
        if !self.path.exists() {
            warn!(
                "⚠️  No segmentation output at {}, session runs without boundary",
                self.path.display()
            );
            return Ok(BoundaryCandidates::default());
        }

        let label = self.path.display().to_string();
        let text =
            fs::read_to_string(&self.path).map_err(|e| EvasionError::producer(&label, 0, e.to_string()))?;
        let raw: RawBoundary = serde_json::from_str(&text)
            .map_err(|e| EvasionError::producer(&label, 0, format!("bad boundary file: {}", e)))?;

        let to_points = |pts: Vec<[f32; 2]>| pts.into_iter().map(Point::from).collect::<Vec<_>>();

        Ok(BoundaryCandidates {
            first_frame: raw.first.map(to_points),
            last_frame: raw.last.map(to_points),
        })
    }
}
