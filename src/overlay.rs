// src/overlay.rs
//
// Writes render events as JSON lines for an external drawing tool. Each
// track gets a stable color, seeded so reruns of a session look the same.

use crate::pipeline::RenderEvent;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct TrackPalette {
    rng: StdRng,
    colors: HashMap<u32, [u8; 3]>,
}

impl TrackPalette {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            colors: HashMap::new(),
        }
    }

    /// Color of a track, assigned on first request
    pub fn color(&mut self, track_id: u32) -> [u8; 3] {
        let rng = &mut self.rng;
        *self.colors.entry(track_id).or_insert_with(|| {
            // Avoid near-black so the overlay stays readable
            [
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
                rng.gen_range(64..=255),
            ]
        })
    }
}

pub struct OverlayWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    palette: TrackPalette,
    written: u64,
}

impl OverlayWriter {
    /// Create `<output_dir>/<name>_render.jsonl`.
    pub fn create(output_dir: impl AsRef<Path>, name: &str, seed: u64) -> Result<Self> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output dir {}", output_dir.display()))?;

        let path = output_dir.join(format!("{}_render.jsonl", name));
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            palette: TrackPalette::new(seed),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append events. A write failure disables the overlay for the rest of
    /// the session; counting is unaffected.
    pub fn write_events(&mut self, events: Vec<RenderEvent>) {
        for event in events {
            let Some(writer) = self.writer.as_mut() else {
                return;
            };

            let mut value = match serde_json::to_value(&event) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Skipping unserializable render event: {}", e);
                    continue;
                }
            };
            if let Some(track_id) = value.get("track_id").and_then(|v| v.as_u64()) {
                let color = self.palette.color(track_id as u32);
                value["color"] = serde_json::json!(color);
            }

            if let Err(e) = writeln!(writer, "{}", value) {
                warn!(
                    "⚠️  Render output {} failed ({}), disabling overlay",
                    self.path.display(),
                    e
                );
                self.writer = None;
                return;
            }
            self.written += 1;
        }
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("flushing {}", self.path.display()))?;
        }
        debug!("Wrote {} render events to {}", self.written, self.path.display());
        Ok(self.path.clone())
    }
}
