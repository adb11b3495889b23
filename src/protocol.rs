//! Subordinate-process wire protocol.
//!
//! This module owns **every message that crosses the process boundary**
//! between the engine and its subordinate connection process. The transport
//! is newline-delimited JSON, one object per line, in both directions.
//!
//! ## Message namespaces
//!
//! | Direction            | Tag field | Carried by           |
//! |----------------------|-----------|----------------------|
//! | engine → subordinate | `action`  | one line on stdin    |
//! | subordinate → engine | `event`   | one line on stdout   |
//!
//! ## Design rules
//!
//! 1. Every message is `Serialize + Deserialize` with snake_case JSON
//!    (the lone wire exception is `joined.peerId`).
//! 2. Malformed inbound lines are discarded, never surfaced as errors —
//!    the protocol is best-effort and partial garbage must not crash the
//!    engine.
//! 3. No engine-internal types leak out: positions cross the wire as bare
//!    `x`/`y` fields or as a `Position` object, peers as `{id, name,
//!    position?}`.

use crate::types::{Peer, Position};
use serde::{Deserialize, Serialize};
use tracing::trace;

// ---------------------------------------------------------------------------
// Outbound commands  (engine → subordinate stdin)
// ---------------------------------------------------------------------------

/// A command written to the subordinate, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Say something into the room (the subordinate handles TTS).
    Speak { text: String },
    /// Absolute move. `theta` is an optional bearing in radians, `step` the
    /// per-tick travel distance (0 signals "stop walking" to animation).
    Move {
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        theta: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    /// Request a full peer roster (`peers` event in reply).
    Peers,
    /// Request a full room snapshot (`status` event in reply).
    Status,
    /// Leave the room; the subordinate exits shortly after.
    Leave,
}

// ---------------------------------------------------------------------------
// Inbound events  (subordinate stdout → engine)
// ---------------------------------------------------------------------------

/// An event parsed from one line of subordinate stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Room membership established. Gates `start()` resolution.
    Joined {
        room: String,
        #[serde(rename = "peerId")]
        peer_id: String,
    },
    /// A peer entered the room.
    PeerJoin {
        id: String,
        name: String,
        #[serde(default)]
        position: Option<Position>,
    },
    /// A peer's position changed.
    PeerMoved {
        id: String,
        name: String,
        #[serde(default)]
        position: Option<Position>,
    },
    /// A peer left the room.
    PeerLeave {
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// Someone spoke. `from` is the speaker's peer id, `position` its
    /// location at utterance time (absent on some servers).
    Transcript {
        from: String,
        name: String,
        text: String,
        #[serde(default)]
        position: Option<Position>,
    },
    /// Echo that our own speech finished playing. Carries no state.
    Spoke {
        #[serde(default)]
        text: Option<String>,
    },
    /// Echo of our own accepted move.
    Moved { x: f64, y: f64 },
    /// Full roster replacement.
    Peers { peers: Vec<Peer> },
    /// Full room snapshot: room id, own position, full roster.
    Status {
        room: String,
        position: Position,
        peers: Vec<Peer>,
    },
    /// Membership ended (server side or in response to `leave`).
    Left,
    /// Soft protocol error from the subordinate. Side-channel only; never
    /// fails a pending command.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Line codec
// ---------------------------------------------------------------------------

/// Parse one stdout line into an [`Event`].
///
/// Returns `None` for blank lines, non-JSON garbage, and unknown event
/// shapes – all silently discarded per protocol rule 2.
pub fn parse_event(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(err) => {
            trace!(%err, line, "discarding malformed protocol line");
            None
        }
    }
}

/// Encode a [`Command`] as a single protocol line, without the terminator.
pub fn encode_command(command: &Command) -> String {
    // Only non-finite floats could fail here; the writer drops empty lines.
    serde_json::to_string(command).unwrap_or_default()
}
