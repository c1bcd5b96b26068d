// src/producer.rs
//
// Contracts of the external collaborators: the person detector/tracker and
// the boundary segmenter. Failures surface as `EvasionError::Producer` and
// are never retried here.

use crate::error::EvasionError;
use crate::types::{FrameDetections, Point, VideoMetadata};

/// Synchronous per-frame detection stream, restricted upstream to persons.
pub trait DetectionSource {
    fn metadata(&self) -> &VideoMetadata;

    /// Next frame in increasing index order, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<FrameDetections>, EvasionError>;
}

/// Segmentation results for the first and last frame of a video.
#[derive(Debug, Clone, Default)]
pub struct BoundaryCandidates {
    pub first_frame: Option<Vec<Point>>,
    pub last_frame: Option<Vec<Point>>,
}

pub trait BoundarySource {
    fn candidates(&mut self) -> Result<BoundaryCandidates, EvasionError>;
}
