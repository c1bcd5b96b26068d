// src/main.rs

mod analysis;
mod config;
mod error;
mod overlay;
mod pipeline;
mod producer;
mod replay_source;
mod types;

use anyhow::{Context, Result};
use overlay::OverlayWriter;
use pipeline::{open_session, save_report, SessionReport};
use producer::DetectionSource;
use replay_source::{ReplayBoundarySource, ReplayDetectionSource, SessionFiles};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn main() -> Result<()> {
    let config_path =
        std::env::var("EVASION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("evasion_detection={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚇 Fare Evasion Detection Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Thresholds: proximity={:.0}px, min_time_outside={:.2}s, finalize_active_tracks={}",
        config.evasion.proximity_threshold,
        config.evasion.min_time_outside,
        config.evasion.finalize_active_tracks
    );
    info!(
        "Detector: {} (conf={:.2}, tracker={}) | Segmenter: {} (conf={:.2})",
        config.detector.model,
        config.detector.confidence,
        config.detector.tracker,
        config.segmentation.model,
        config.segmentation.confidence
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let sessions = replay_source::find_sessions(&config.session.input_dir);
    if sessions.is_empty() {
        error!("No recorded sessions found in {}", config.session.input_dir);
        return Ok(());
    }

    let mut total_evasions = 0u64;
    let mut done = 0usize;
    let mut failed = 0usize;

    for (idx, session) in sessions.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing session {}/{}: {}",
            idx + 1,
            sessions.len(),
            session.name
        );
        info!("========================================\n");

        match process_session(session, &config, &stop) {
            Ok(report) => {
                log_report(&report);
                done += 1;
                total_evasions += report.evasion_count();
                if report.cancelled {
                    warn!("⏹️  Batch stopped by user");
                    break;
                }
            }
            Err(e) => {
                failed += 1;
                error!("Failed to process session {}: {:#}", session.name, e);
            }
        }
    }

    info!("\n========================================");
    info!(
        "✓ {} session(s) done, {} failed | total evasions: {}",
        done,
        failed,
        total_evasions
    );
    Ok(())
}

fn process_session(session: &SessionFiles, config: &Config, stop: &AtomicBool) -> Result<SessionReport> {
    let mut source = ReplayDetectionSource::open(&session.detections, config.detector.confidence)?;
    let mut boundary_source = ReplayBoundarySource::new(&session.boundary);
    let orchestrator = open_session(config, source.metadata().clone(), &mut boundary_source)?;

    let mut overlay = if config.session.emit_render_events {
        Some(OverlayWriter::create(
            &config.session.output_dir,
            &session.name,
            config.session.render_seed,
        )?)
    } else {
        None
    };

    let report = orchestrator.run(&mut source, stop, |events| {
        if let Some(writer) = overlay.as_mut() {
            writer.write_events(events);
        }
    })?;

    if let Some(writer) = overlay {
        let written = writer.written();
        let path = writer.finish()?;
        info!("🎨 {} render events written to {}", written, path.display());
    }

    if config.session.save_report {
        save_report(&report, config, &session.name)?;
    }

    Ok(report)
}

fn log_report(report: &SessionReport) {
    let summary = &report.summary;

    info!("\n✓ Session processed{}", if report.cancelled { " (partial)" } else { "" });
    info!("  Total frames: {}", report.frames_processed);
    info!(
        "  Detections: {} ({} skipped)",
        report.detections_seen, report.detections_skipped
    );
    info!("  🔢 Identities tracked: {}", summary.tracked_count);
    info!("  🚫 Ignored (first seen inside): {}", summary.ignored_count);
    info!("  🚶 Entered the zone: {}", summary.entered_count);

    if summary.evasion_count > 0 {
        warn!("  🚨 EVASIONS: {}", summary.evasion_count);
        warn!("     ➡️  Entry without validation: {}", summary.case1_count);
        warn!("     👻 Disappeared near boundary: {}", summary.case2_count);
    } else {
        info!("  🚨 Evasions: 0");
    }

    if summary.unresolved_count > 0 {
        info!("  ❔ Unresolved at end of stream: {}", summary.unresolved_count);
    }
    info!("  Processing Speed: {:.1} FPS", report.processing_fps);
}
