// src/pipeline/report.rs
//
// Session outcome, both as a scalar evasion count and as a detailed record.

use super::metrics::EvasionSummary;
use crate::analysis::{BoundarySelection, CandidateOrigin, Classification, EvasionMark, Identity};
use crate::types::{Config, DetectorConfig, EvasionConfig, SegmentationConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct BoundaryInfo {
    pub origin: CandidateOrigin,
    pub vertices: usize,
    pub area: f32,
    pub perimeter: f32,
    pub compactness: f32,
}

impl From<&BoundarySelection> for BoundaryInfo {
    fn from(selection: &BoundarySelection) -> Self {
        Self {
            origin: selection.origin,
            vertices: selection.polygon.points().len(),
            area: selection.polygon.area(),
            perimeter: selection.polygon.perimeter(),
            compactness: selection.compactness(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityRecord {
    pub track_id: u32,
    pub classification: Classification,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    pub tracked_frames: u64,
    pub positions: usize,
}

impl From<&Identity> for IdentityRecord {
    fn from(identity: &Identity) -> Self {
        Self {
            track_id: identity.id,
            classification: identity.classification(),
            first_seen_frame: identity.first_seen_frame,
            last_seen_frame: identity.last_seen_frame,
            tracked_frames: identity.tracked_frames(),
            positions: identity.positions().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub source: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frames_processed: u64,
    pub detections_seen: u64,
    pub detections_skipped: u64,
    pub boundary: Option<BoundaryInfo>,
    pub summary: EvasionSummary,
    pub marks: Vec<EvasionMark>,
    pub identities: Vec<IdentityRecord>,
    /// Stream was stopped before its end
    pub cancelled: bool,
    pub processing_fps: f64,
}

impl SessionReport {
    pub fn evasion_count(&self) -> u64 {
        self.summary.evasion_count
    }
}

#[derive(Serialize)]
struct ReportSettings<'a> {
    detector: &'a DetectorConfig,
    segmentation: &'a SegmentationConfig,
    evasion: &'a EvasionConfig,
}

#[derive(Serialize)]
struct DetailedReportFile<'a> {
    generated_at: String,
    settings: ReportSettings<'a>,
    #[serde(flatten)]
    report: &'a SessionReport,
}

#[derive(Serialize)]
struct ScalarReportFile<'a> {
    generated_at: String,
    source: &'a str,
    evasion_count: u64,
    cancelled: bool,
}

/// Write `<output_dir>/<name>_evasion.json`.
pub fn save_report(report: &SessionReport, config: &Config, name: &str) -> Result<PathBuf> {
    let output_dir = Path::new(&config.session.output_dir);
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;

    let path = output_dir.join(format!("{}_evasion.json", name));
    let generated_at = chrono::Utc::now().to_rfc3339();

    let json = if config.session.detailed_metrics {
        serde_json::to_string_pretty(&DetailedReportFile {
            generated_at,
            settings: ReportSettings {
                detector: &config.detector,
                segmentation: &config.segmentation,
                evasion: &config.evasion,
            },
            report,
        })?
    } else {
        serde_json::to_string_pretty(&ScalarReportFile {
            generated_at,
            source: &report.source,
            evasion_count: report.evasion_count(),
            cancelled: report.cancelled,
        })?
    };

    fs::write(&path, json).with_context(|| format!("writing report {}", path.display()))?;
    info!("💾 Report written to {}", path.display());
    Ok(path)
}
