// src/analysis/mod.rs
//
// Evasion classification core.
//
// Signal flow:
//   Segmentation (first/last frame) → boundary_selector → BoundaryPolygon ─┐
//   Tracked detections → track_registry ─────────────────────────────────────┼→ evasion_classifier
//                                                                           │
// Orchestrated per session by pipeline::SessionOrchestrator.

pub mod boundary;
pub mod boundary_selector;
pub mod evasion_classifier;
pub mod track_registry;

pub use boundary::BoundaryPolygon;
pub use boundary_selector::{BoundarySelection, CandidateOrigin};
pub use evasion_classifier::{DisappearanceVerdict, EvasionClassifier, EvasionKind, EvasionMark};
pub use track_registry::{
    Classification, ClassificationCounts, Identity, Observation, TrackRegistry,
};
