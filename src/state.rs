//! `RoomState` — the single mutable snapshot of "what I currently believe
//! about the room": own position, peer roster, follow target, breadcrumb
//! trail, recent transcripts.
//!
//! One instance per active room membership, owned behind the engine's lock.
//! All mutation policies (trail decimation, teleport reset, ring-buffer
//! caps) live here so the router and follow stepper stay thin.

use crate::types::{Peer, Position, Transcript};
use std::collections::{HashMap, VecDeque};

/// Minimum spacing between consecutive breadcrumbs, in map units. Position
/// updates closer than this to the trail tail are dropped – the trail is a
/// deliberate decimation of the observed path, not a raw sample log.
pub const BREADCRUMB_SPACING: f64 = 5.0;

/// Maximum trail length; oldest points evicted first.
pub const BREADCRUMB_CAP: usize = 100;

/// A target jump larger than this between consecutive observations is a
/// teleport: the trail is cleared and reseeded rather than walked.
pub const TELEPORT_THRESHOLD: f64 = 200.0;

/// Ring-buffer capacity for recently heard transcripts.
pub const TRANSCRIPT_CAP: usize = 10;

/// Local mirror of room membership state.
#[derive(Debug, Default)]
pub struct RoomState {
    pub connected: bool,
    pub room: Option<String>,
    pub self_id: Option<String>,
    pub self_name: Option<String>,
    pub position: Position,
    /// Peer roster, keyed by server-assigned id.
    pub peers: HashMap<String, Peer>,
    /// Display name of the peer currently being followed.
    pub follow_target: Option<String>,
    /// Decimated trail of the follow target's observed path, oldest first.
    pub breadcrumbs: VecDeque<Position>,
    /// Recently heard transcripts, oldest first.
    pub transcripts: VecDeque<Transcript>,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the initial empty/disconnected shape. No soft history
    /// crosses a disconnect boundary.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    /// Insert or replace a peer by id.
    pub fn upsert_peer(&mut self, peer: Peer) {
        self.peers.insert(peer.id.clone(), peer);
    }

    /// Remove a peer by id, returning it if present.
    pub fn remove_peer(&mut self, id: &str) -> Option<Peer> {
        self.peers.remove(id)
    }

    /// Replace the entire roster (full `peers` / `status` events).
    pub fn replace_peers(&mut self, peers: Vec<Peer>) {
        self.peers = peers.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    /// Case-insensitive lookup by display name. Names are not unique; the
    /// first match wins.
    pub fn find_peer_by_name(&self, name: &str) -> Option<&Peer> {
        self.peers
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// True when `name` matches the active follow target (case-insensitive).
    pub fn is_follow_target(&self, name: &str) -> bool {
        self.follow_target
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(name))
    }

    // -----------------------------------------------------------------------
    // Follow bookkeeping
    // -----------------------------------------------------------------------

    /// Enter follow mode: set the target, clear the trail, seed it with the
    /// target's last known position if there is one.
    pub fn begin_follow(&mut self, target: String, seed: Option<Position>) {
        self.follow_target = Some(target);
        self.breadcrumbs.clear();
        if let Some(pos) = seed {
            self.breadcrumbs.push_back(pos);
        }
    }

    /// Leave follow mode, returning whether anyone was being followed.
    pub fn clear_follow(&mut self) -> bool {
        self.breadcrumbs.clear();
        self.follow_target.take().is_some()
    }

    /// Record an observed position of the follow target.
    ///
    /// Applies all three trail policies: teleport reset (jump beyond
    /// [`TELEPORT_THRESHOLD`] discards the trail and reseeds), spacing
    /// decimation ([`BREADCRUMB_SPACING`] from the current tail), and the
    /// [`BREADCRUMB_CAP`] with oldest-first eviction.
    pub fn record_breadcrumb(&mut self, pos: Position) {
        if let Some(tail) = self.breadcrumbs.back().copied() {
            let gap = tail.distance_to(pos);
            if gap > TELEPORT_THRESHOLD {
                self.breadcrumbs.clear();
                self.breadcrumbs.push_back(pos);
                return;
            }
            if gap <= BREADCRUMB_SPACING {
                return;
            }
        }
        self.breadcrumbs.push_back(pos);
        while self.breadcrumbs.len() > BREADCRUMB_CAP {
            self.breadcrumbs.pop_front();
        }
    }

    // -----------------------------------------------------------------------
    // Transcripts
    // -----------------------------------------------------------------------

    /// Append to the transcript ring buffer, evicting oldest past
    /// [`TRANSCRIPT_CAP`].
    pub fn push_transcript(&mut self, transcript: Transcript) {
        self.transcripts.push_back(transcript);
        while self.transcripts.len() > TRANSCRIPT_CAP {
            self.transcripts.pop_front();
        }
    }
}
