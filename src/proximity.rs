//! Proximity filtering: distance computation and the hearing-radius /
//! self-echo gating policy applied to transcript events.

use crate::types::Position;

/// Euclidean distance. Symmetric, non-negative, zero iff `a == b`.
pub fn distance(a: Position, b: Position) -> f64 {
    a.distance_to(b)
}

/// Decide whether a transcript should be heard.
///
/// Two gates, applied in order:
///
/// 1. **Self-echo suppression** – a speaker name matching our own display
///    name (case-insensitive) is dropped unconditionally, at any distance,
///    so the engine never reacts to its own synthesized speech reflected
///    back through the room.
/// 2. **Hearing radius** – with a speaker position, accept only within
///    `hearing_radius` of `self_pos` (inclusive boundary). Without one the
///    distance cannot be evaluated and the filter defaults to acceptance –
///    an explicit weaker guarantee, not a silent drop.
pub fn hears(
    self_name: Option<&str>,
    self_pos: Position,
    hearing_radius: f64,
    speaker: &str,
    speaker_pos: Option<Position>,
) -> bool {
    if self_name.is_some_and(|n| n.eq_ignore_ascii_case(speaker)) {
        return false;
    }
    match speaker_pos {
        Some(pos) => distance(self_pos, pos) <= hearing_radius,
        None => true,
    }
}
