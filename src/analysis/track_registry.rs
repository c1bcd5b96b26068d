// src/analysis/track_registry.rs
//
// Per-session identity state, keyed by the detector's track ID.
//
// Lifecycle of an identity:
//   first sighting inside the boundary  → Ignored (forever)
//   first sighting outside              → Unresolved, trajectory recorded
//   Unresolved → EntryEvasion | DisappearanceEvasion   (immutable afterwards)
//   Unresolved → Benign   when a disappearance does not qualify;
//   Benign → Unresolved   if the track shows up again (detection flicker)
//
// The registry is created fresh for every session and dropped with it.

use crate::types::Point;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Unresolved,
    Ignored,
    EntryEvasion,
    DisappearanceEvasion,
    Benign,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unresolved => "UNRESOLVED",
            Self::Ignored => "IGNORED",
            Self::EntryEvasion => "ENTRY_EVASION",
            Self::DisappearanceEvasion => "DISAPPEARANCE_EVASION",
            Self::Benign => "BENIGN",
        }
    }

    /// Final states that nothing may overwrite.
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            Self::Ignored | Self::EntryEvasion | Self::DisappearanceEvasion
        )
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a single `observe` call did to the identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting was already inside the boundary
    FirstSeenInside,
    /// Identity is ignored; only the containment flag was refreshed
    Ignored,
    Tracked {
        was_contained: bool,
        contained: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: u32,
    positions: Vec<Point>,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    contained: bool,
    was_contained: bool,
    pub ignored: bool,
    classification: Classification,
}

impl Identity {
    fn new(id: u32, frame_index: u64, contained: bool) -> Self {
        Self {
            id,
            positions: Vec::new(),
            first_seen_frame: frame_index,
            last_seen_frame: frame_index,
            contained,
            was_contained: false,
            ignored: contained,
            classification: if contained {
                Classification::Ignored
            } else {
                Classification::Unresolved
            },
        }
    }

    /// Trajectory in temporal order. Empty for ignored identities.
    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn last_position(&self) -> Option<Point> {
        self.positions.last().copied()
    }

    pub fn contained(&self) -> bool {
        self.contained
    }

    /// Containment before the most recent observation
    pub fn was_contained(&self) -> bool {
        self.was_contained
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Frames between first and last recorded sighting
    pub fn tracked_frames(&self) -> u64 {
        self.last_seen_frame - self.first_seen_frame
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationCounts {
    pub unresolved: usize,
    pub ignored: usize,
    pub entry_evasion: usize,
    pub disappearance_evasion: usize,
    pub benign: usize,
}

impl ClassificationCounts {
    pub fn total(&self) -> usize {
        self.unresolved + self.ignored + self.entry_evasion + self.disappearance_evasion + self.benign
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct TrackRegistry {
    identities: BTreeMap<u32, Identity>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sighting of `id`. Called at most once per identity per frame.
    pub fn observe(
        &mut self,
        id: u32,
        centroid: Point,
        frame_index: u64,
        contained: bool,
    ) -> Observation {
        let is_new = !self.identities.contains_key(&id);
        let identity = self
            .identities
            .entry(id)
            .or_insert_with(|| Identity::new(id, frame_index, contained));

        if is_new && identity.ignored {
            debug!(
                "Track {} first seen inside the boundary at F{}, ignored",
                id, frame_index
            );
            return Observation::FirstSeenInside;
        }

        if identity.ignored {
            identity.contained = contained;
            return Observation::Ignored;
        }

        if identity.classification == Classification::Benign {
            debug!(
                "Track {} reappeared at F{}, disappearance verdict withdrawn",
                id, frame_index
            );
            identity.classification = Classification::Unresolved;
        }

        identity.positions.push(centroid);
        identity.last_seen_frame = identity.last_seen_frame.max(frame_index);
        identity.was_contained = identity.contained;
        identity.contained = contained;

        Observation::Tracked {
            was_contained: identity.was_contained,
            contained,
        }
    }

    /// Apply a classification. Locked states (ignored or an evasion) are
    /// never overwritten, and ignored identities never become evasions.
    /// Returns whether the classification changed.
    pub fn classify(&mut self, id: u32, classification: Classification) -> bool {
        let Some(identity) = self.identities.get_mut(&id) else {
            return false;
        };

        if identity.classification.is_locked() || identity.ignored {
            debug!(
                "Track {} is {}, refusing {}",
                id, identity.classification, classification
            );
            return false;
        }
        if classification == Classification::Ignored {
            return false;
        }

        let changed = identity.classification != classification;
        identity.classification = classification;
        changed
    }

    /// Tracked (non-ignored) identities that were not seen this frame.
    pub fn disappeared(&self, active_ids: &HashSet<u32>) -> Vec<u32> {
        self.identities
            .values()
            .filter(|identity| !identity.ignored && !active_ids.contains(&identity.id))
            .map(|identity| identity.id)
            .collect()
    }

    pub fn get(&self, id: u32) -> Option<&Identity> {
        self.identities.get(&id)
    }

    /// Identities in ascending ID order
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn counts(&self) -> ClassificationCounts {
        let mut counts = ClassificationCounts::default();
        for identity in self.identities.values() {
            match identity.classification {
                Classification::Unresolved => counts.unresolved += 1,
                Classification::Ignored => counts.ignored += 1,
                Classification::EntryEvasion => counts.entry_evasion += 1,
                Classification::DisappearanceEvasion => counts.disappearance_evasion += 1,
                Classification::Benign => counts.benign += 1,
            }
        }
        counts
    }
}
