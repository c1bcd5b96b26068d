// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub detector: DetectorConfig,
    pub segmentation: SegmentationConfig,
    pub evasion: EvasionConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Settings of the external person detector/tracker. Only `confidence` is
/// consumed here (as a gate on replayed detections).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub model: String,
    pub confidence: f32,
    pub iou: f32,
    pub imgsz: u32,
    /// Identity-association algorithm used upstream ("bytetrack", "botsort")
    pub tracker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub model: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvasionConfig {
    /// Max unsigned distance (px) from the boundary for a disappearance to count
    pub proximity_threshold: f32,
    /// Seconds since first sighting before an entry or disappearance counts
    pub min_time_outside: f64,
    /// Run the disappearance check on tracks still active at end of stream
    #[serde(default)]
    pub finalize_active_tracks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_report: bool,
    pub detailed_metrics: bool,
    pub emit_render_events: bool,
    pub render_seed: u64,
    pub max_pending_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// DETECTIONS
// ============================================================================

/// Image-space point in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

/// One tracked person in one frame, as handed over by the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub track_id: u32,
    pub centroid: Point,
    pub confidence: f32,
}

/// All tracked persons of a single frame. Frame indices start at 1.
#[derive(Debug, Clone, Default)]
pub struct FrameDetections {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Path of the video the detections were produced from
    pub source: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}
