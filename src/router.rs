//! Event routing – the room's state machine.
//!
//! Pure mapping from inbound protocol events to [`RoomState`] mutations and
//! routed effects. The caller (the engine's pump task) holds the state lock
//! across exactly one `route_event` call, then delivers the returned effect
//! outside the lock.
//!
//! ## Event contract (inbound)
//!
//! | Event        | Effect on RoomState                                        |
//! |--------------|------------------------------------------------------------|
//! | `joined`     | connected = true, room id, self id                         |
//! | `peer_join`  | insert/replace peer by id                                  |
//! | `peer_moved` | patch peer position; breadcrumb if it is the follow target |
//! | `peer_leave` | remove peer; auto-unfollow if target name no longer resolves |
//! | `peers`      | replace entire roster                                      |
//! | `status`     | replace room, self position and entire roster              |
//! | `moved`      | set self position to the echoed value                      |
//! | `transcript` | proximity gate → ring buffer + `Routed::Heard`             |
//! | `spoke`      | ignored (own TTS completion echo)                          |
//! | `left`       | full reset to the disconnected shape                       |
//! | `error`      | surfaced as `Notice::Error`, never a command failure       |

use crate::protocol::Event;
use crate::proximity;
use crate::state::RoomState;
use crate::types::{EngineConfig, Peer, Position, Transcript};
use tracing::debug;

/// Side-channel notifications delivered to the registered notice handler.
#[derive(Debug, Clone)]
pub enum Notice {
    /// Soft `error` event from the subordinate.
    Error { message: String },
    /// The subordinate process exited while we believed we were connected.
    /// No automatic recovery is attempted; the caller must join again.
    ConnectionLost { code: Option<i32> },
}

/// What the pump task should do after a state mutation.
#[derive(Debug)]
pub enum Routed {
    /// Nothing to deliver.
    None,
    /// An accepted transcript, for the single-slot transcript handler.
    Heard(Transcript),
    /// A side-channel notice, for the single-slot notice handler.
    Notice(Notice),
}

/// Apply one inbound event to the room state.
pub fn route_event(state: &mut RoomState, config: &EngineConfig, event: Event) -> Routed {
    match event {
        Event::Joined { room, peer_id } => {
            debug!(%room, %peer_id, "joined room");
            state.connected = true;
            state.room = Some(room);
            state.self_id = Some(peer_id);
            Routed::None
        }

        Event::PeerJoin { id, name, position } => {
            debug!(%id, %name, "peer joined");
            state.upsert_peer(Peer { id, name, position });
            Routed::None
        }

        Event::PeerMoved { id, name, position } => {
            if let Some(pos) = position {
                patch_peer_position(state, id, name.clone(), pos);
                if state.is_follow_target(&name) {
                    state.record_breadcrumb(pos);
                }
            }
            Routed::None
        }

        Event::PeerLeave { id, name } => {
            let removed = state.remove_peer(&id);
            if let Some(target) = state.follow_target.clone() {
                // The departed peer counts as the target when its name
                // matches, or when no name survives to rule it out.
                let departed_name = removed.map(|p| p.name).or(name);
                let was_target =
                    departed_name.is_none_or(|n| n.eq_ignore_ascii_case(&target));
                if was_target && state.find_peer_by_name(&target).is_none() {
                    debug!(%target, "follow target left with no same-named peer – unfollowing");
                    state.clear_follow();
                }
            }
            Routed::None
        }

        Event::Peers { peers } => {
            debug!(count = peers.len(), "roster replaced");
            state.replace_peers(peers);
            Routed::None
        }

        Event::Status {
            room,
            position,
            peers,
        } => {
            debug!(%room, count = peers.len(), "status snapshot applied");
            state.room = Some(room);
            state.position = position;
            state.replace_peers(peers);
            Routed::None
        }

        Event::Moved { x, y } => {
            state.position = Position::new(x, y);
            Routed::None
        }

        Event::Transcript {
            from: _,
            name,
            text,
            position,
        } => {
            let heard = proximity::hears(
                state.self_name.as_deref(),
                state.position,
                config.hearing_radius,
                &name,
                position,
            );
            if !heard {
                return Routed::None;
            }
            let transcript = Transcript::new(name, text);
            state.push_transcript(transcript.clone());
            Routed::Heard(transcript)
        }

        Event::Spoke { text } => {
            debug!(?text, "speech playback finished");
            Routed::None
        }

        Event::Left => {
            debug!("left room – resetting state");
            state.reset();
            Routed::None
        }

        Event::Error { message } => Routed::Notice(Notice::Error { message }),
    }
}

/// Patch a peer's position in place, inserting the peer when the move is the
/// first we hear of it.
fn patch_peer_position(state: &mut RoomState, id: String, name: String, pos: Position) {
    match state.peers.get_mut(&id) {
        Some(peer) => peer.position = Some(pos),
        None => state.upsert_peer(Peer {
            id,
            name,
            position: Some(pos),
        }),
    }
}
