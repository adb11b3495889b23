//! Engine error taxonomy.
//!
//! Command-surface failures are returned as values so a calling layer can
//! surface them directly without translation. Protocol parse failures are
//! not represented here – malformed lines are discarded in `protocol.rs`.

use std::time::Duration;
use thiserror::Error;

/// Everything the command surface and supervisor can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not connected to any room")]
    NotConnected,

    #[error("already connected to room '{0}'")]
    AlreadyConnected(String),

    #[error("a subordinate connection process is already running")]
    AlreadyRunning,

    #[error("no peer named '{0}' in the room")]
    PeerNotFound(String),

    #[error("subordinate did not report joined within {0:?}")]
    SpawnTimeout(Duration),

    #[error("failed to launch subordinate process: {0}")]
    SpawnFailure(String),

    #[error("failed to send command to subordinate: {0}")]
    SendFailure(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
