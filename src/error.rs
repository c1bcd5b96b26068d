// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvasionError {
    /// The detector or segmentation collaborator could not supply a frame.
    /// Fatal for the session.
    #[error("producer failed at frame {frame_index} of {path}: {reason}")]
    Producer {
        path: String,
        frame_index: u64,
        reason: String,
    },

    /// Zero-area or otherwise unusable boundary candidate. Callers treat the
    /// candidate as absent.
    #[error("degenerate boundary geometry: {0}")]
    DegenerateGeometry(String),

    /// Missing or non-positive threshold. Fatal at session start.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl EvasionError {
    pub fn producer(path: impl Into<String>, frame_index: u64, reason: impl Into<String>) -> Self {
        Self::Producer {
            path: path.into(),
            frame_index,
            reason: reason.into(),
        }
    }
}
