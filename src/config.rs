// src/config.rs

use crate::error::EvasionError;
use crate::types::{
    Config, DetectorConfig, EvasionConfig, LoggingConfig, SegmentationConfig, SessionConfig,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| EvasionError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds that would make the time/distance gates meaningless.
    pub fn validate(&self) -> Result<(), EvasionError> {
        self.evasion.validate()?;

        let conf = self.detector.confidence;
        if !(0.0..=1.0).contains(&conf) {
            return Err(EvasionError::Configuration(format!(
                "detector.confidence must be within [0, 1], got {}",
                conf
            )));
        }
        if self.session.max_pending_events == 0 {
            return Err(EvasionError::Configuration(
                "session.max_pending_events must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl EvasionConfig {
    pub fn validate(&self) -> Result<(), EvasionError> {
        if !(self.proximity_threshold.is_finite() && self.proximity_threshold > 0.0) {
            return Err(EvasionError::Configuration(format!(
                "evasion.proximity_threshold must be positive, got {}",
                self.proximity_threshold
            )));
        }
        if !(self.min_time_outside.is_finite() && self.min_time_outside > 0.0) {
            return Err(EvasionError::Configuration(format!(
                "evasion.min_time_outside must be positive, got {}",
                self.min_time_outside
            )));
        }
        Ok(())
    }
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: 50.0,
            min_time_outside: 1.0,
            finalize_active_tracks: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector: DetectorConfig {
                model: "models/yolo11m.pt".to_string(),
                confidence: 0.35,
                iou: 0.4,
                imgsz: 1280,
                tracker: "botsort".to_string(),
            },
            segmentation: SegmentationConfig {
                model: "models/stationv1.pt".to_string(),
                confidence: 0.90,
            },
            evasion: EvasionConfig::default(),
            session: SessionConfig {
                input_dir: "sessions".to_string(),
                output_dir: "output".to_string(),
                save_report: true,
                detailed_metrics: true,
                emit_render_events: false,
                render_seed: 42,
                max_pending_events: 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
detector:
  model: models/yolo11m.pt
  confidence: 0.35
  iou: 0.4
  imgsz: 1280
  tracker: botsort
segmentation:
  model: models/stationv1.pt
  confidence: 0.9
evasion:
  proximity_threshold: 50.0
  min_time_outside: 1.5
session:
  input_dir: sessions
  output_dir: output
  save_report: true
  detailed_metrics: false
  emit_render_events: false
  render_seed: 7
  max_pending_events: 64
logging:
  level: debug
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(SAMPLE);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.evasion.min_time_outside, 1.5);
        assert_eq!(config.evasion.proximity_threshold, 50.0);
        assert!(!config.evasion.finalize_active_tracks);
        assert_eq!(config.session.render_seed, 7);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_threshold_is_configuration_error() {
        let broken = SAMPLE.replace("  proximity_threshold: 50.0\n", "");
        let file = write_config(&broken);
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvasionError>(),
            Some(EvasionError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_positive_thresholds_rejected() {
        let mut config = Config::default();
        config.evasion.min_time_outside = 0.0;
        assert!(matches!(
            config.validate(),
            Err(EvasionError::Configuration(_))
        ));

        let mut config = Config::default();
        config.evasion.proximity_threshold = -5.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evasion.proximity_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
