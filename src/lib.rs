//! Room Presence Agent
//!
//! An autonomous participant engine for a shared 2-D spatial room: tracks
//! its own and peers' positions, filters incoming speech by physical
//! proximity, and can follow a moving peer by replaying that peer's recent
//! path.
//!
//! ## Architecture
//!
//! ```text
//! RoomEngine  (engine.rs)          ← join/leave/speak/move/follow/status facade
//!   ├── ConnectionSupervisor  (supervisor.rs) ← subordinate process + NDJSON framing
//!   ├── RoomState  (state.rs)      ← the one mutable room snapshot
//!   ├── route_event  (router.rs)   ← inbound event → state machine
//!   ├── proximity  (proximity.rs)  ← hearing radius / self-echo gate
//!   └── follow  (follow.rs)        ← breadcrumb trail stepper
//! ```
//!
//! The subordinate connection process is an external collaborator: a black
//! box that joins the room server and speaks line-delimited JSON on
//! stdin/stdout (`protocol.rs`). One engine instance owns exactly one
//! subordinate and one room membership; a second room needs a second,
//! fully independent engine.

pub mod engine;
pub mod error;
pub mod follow;
pub mod protocol;
pub mod proximity;
pub mod router;
pub mod state;
pub mod supervisor;
pub mod types;

// Convenience re-exports
pub use engine::RoomEngine;
pub use error::{EngineError, Result};
pub use router::Notice;
pub use state::RoomState;
pub use supervisor::{ConnectionSupervisor, SubordinateOptions};
pub use types::{EngineConfig, Peer, Position, StatusReport, Transcript};
