//! Core engine types shared across all modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// A point in the room's 2-D coordinate space. Arbitrary map units, no bounds
/// enforced at this layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.0}, {:.0})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

/// Another participant in the room.
///
/// `id` is server-assigned and unique; `name` is the display name and is
/// *not* guaranteed unique. `position` stays `None` until first observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Peer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

// ---------------------------------------------------------------------------
// Transcripts
// ---------------------------------------------------------------------------

/// One heard utterance, after proximity filtering.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Speaker display name.
    pub name: String,
    pub text: String,
    /// When the engine accepted the transcript (local clock).
    pub at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Engine-wide tunables. One instance per [`RoomEngine`](crate::RoomEngine).
///
/// [`EngineConfig::default`] matches the production deployment; tests shrink
/// the timing windows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Subordinate connection process to launch.
    pub subordinate_cmd: String,
    /// Base arguments, before `--room`/`--name`/`--voice` are appended.
    pub subordinate_args: Vec<String>,
    /// Display name announced to the room (also drives self-echo suppression).
    pub name: String,
    /// Optional TTS voice passed through to the subordinate.
    pub voice: Option<String>,
    /// How far speech carries, in map units (inclusive boundary).
    pub hearing_radius: f64,
    /// Comfort zone while following – no movement inside this distance.
    pub follow_distance: f64,
    /// Maximum travel per follow tick, in map units.
    pub follow_step: f64,
    /// Follow stepper tick interval.
    pub follow_tick: Duration,
    /// How long `start` waits for the subordinate's `joined` event.
    pub join_timeout: Duration,
    /// Grace between the `leave` command and killing the subordinate.
    pub stop_grace: Duration,
    /// Fixed wait between a `status` request and rendering the report.
    pub status_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subordinate_cmd: "room-client".into(),
            subordinate_args: Vec::new(),
            name: "agent".into(),
            voice: None,
            hearing_radius: 150.0,
            follow_distance: 40.0,
            follow_step: 20.0,
            follow_tick: Duration::from_millis(1000),
            join_timeout: Duration::from_secs(15),
            stop_grace: Duration::from_millis(500),
            status_grace: Duration::from_millis(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Status report
// ---------------------------------------------------------------------------

/// One peer's line in a [`StatusReport`].
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub name: String,
    pub position: Option<Position>,
    /// Distance from self, when the peer's position is known.
    pub distance: Option<f64>,
    /// Within hearing radius (unknown-position peers count as out of range).
    pub in_range: bool,
}

/// Snapshot of the engine's view of the room, rendered by `status()`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub room: Option<String>,
    pub position: Position,
    pub hearing_radius: f64,
    pub follow_target: Option<String>,
    pub peers: Vec<PeerStatus>,
    pub transcripts: Vec<Transcript>,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "room: {} | self at {} | hearing radius {:.0}",
            self.room.as_deref().unwrap_or("-"),
            self.position,
            self.hearing_radius,
        )?;
        if let Some(target) = &self.follow_target {
            writeln!(f, "following: {}", target)?;
        }
        writeln!(f, "peers ({}):", self.peers.len())?;
        for p in &self.peers {
            match (p.position, p.distance) {
                (Some(pos), Some(d)) => writeln!(
                    f,
                    "  {} at {} – {:.1} units {}",
                    p.name,
                    pos,
                    d,
                    if p.in_range {
                        "(in range)"
                    } else {
                        "(out of range)"
                    },
                )?,
                _ => writeln!(f, "  {} – position unknown", p.name)?,
            }
        }
        if !self.transcripts.is_empty() {
            writeln!(f, "recent transcripts:")?;
            for t in &self.transcripts {
                writeln!(f, "  [{}] {}: {}", t.at.format("%H:%M:%S"), t.name, t.text)?;
            }
        }
        Ok(())
    }
}
