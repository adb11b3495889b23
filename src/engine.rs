//! `RoomEngine` – the command facade.
//!
//! Composes the supervisor, room state, event router and follow stepper
//! behind the join/leave/speak/move/follow/unfollow/status surface, and
//! enforces the connection invariants on every call.
//!
//! Data flows one way in (supervisor → router → state), control flows one
//! way out (facade → supervisor send), with optimistic local mutation ahead
//! of any acknowledgement.

use crate::error::{EngineError, Result};
use crate::follow::run_stepper;
use crate::protocol::Command;
use crate::router::{route_event, Notice, Routed};
use crate::state::RoomState;
use crate::supervisor::{ConnectionSupervisor, Inbound, SubordinateOptions};
use crate::types::{EngineConfig, PeerStatus, Position, StatusReport, Transcript};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

/// Single-slot subscription: re-registration replaces the previous handler,
/// it does not accumulate.
type Handler<T> = Arc<Mutex<Option<Box<dyn Fn(&T) + Send>>>>;

pub struct RoomEngine {
    config: EngineConfig,
    state: Arc<Mutex<RoomState>>,
    supervisor: ConnectionSupervisor,
    transcript_handler: Handler<Transcript>,
    notice_handler: Handler<Notice>,
    pump: Option<JoinHandle<()>>,
    stepper: Option<JoinHandle<()>>,
}

impl RoomEngine {
    pub fn new(config: EngineConfig) -> Self {
        let supervisor = ConnectionSupervisor::new(
            config.subordinate_cmd.clone(),
            config.subordinate_args.clone(),
            config.join_timeout,
            config.stop_grace,
        );
        Self {
            config,
            state: Arc::new(Mutex::new(RoomState::new())),
            supervisor,
            transcript_handler: Arc::new(Mutex::new(None)),
            notice_handler: Arc::new(Mutex::new(None)),
            pump: None,
            stepper: None,
        }
    }

    /// Shared room state. Lock only for short synchronous reads.
    pub fn state(&self) -> Arc<Mutex<RoomState>> {
        self.state.clone()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register the transcript handler (replaces any previous one).
    pub fn on_transcript(&self, handler: impl Fn(&Transcript) + Send + 'static) {
        *self.transcript_handler.lock() = Some(Box::new(handler));
    }

    /// Register the notice handler (replaces any previous one).
    pub fn on_notice(&self, handler: impl Fn(&Notice) + Send + 'static) {
        *self.notice_handler.lock() = Some(Box::new(handler));
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Join `room`, launching the subordinate connection process.
    ///
    /// Idempotent no-op when already connected to the same room; fails with
    /// [`EngineError::AlreadyConnected`] when connected to a different one.
    /// On success an initial full roster is requested.
    pub async fn join(&mut self, room: &str, name: Option<&str>) -> Result<()> {
        {
            let st = self.state.lock();
            if st.connected {
                match st.room.as_deref() {
                    Some(current) if current == room => return Ok(()),
                    Some(current) => {
                        return Err(EngineError::AlreadyConnected(current.to_string()))
                    }
                    None => {}
                }
            }
        }

        // A subordinate can outlive its membership (server-side `left`, or a
        // crash we have already marked); clear it before spawning fresh.
        if self.supervisor.is_running() {
            self.supervisor.stop().await;
        }

        let display = name.unwrap_or(&self.config.name).to_string();
        let options = SubordinateOptions {
            name: display.clone(),
            voice: self.config.voice.clone(),
        };

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
        self.supervisor.start(room, &options, inbound_tx).await?;

        if let Some(stale) = self.pump.take() {
            stale.abort();
        }

        // The joined event was already observed on the stream during start;
        // mark connected now so the idempotency check does not race the pump.
        {
            let mut st = self.state.lock();
            st.reset();
            st.self_name = Some(display);
            st.connected = true;
            st.room = Some(room.to_string());
        }

        self.pump = Some(tokio::spawn(run_pump(
            self.state.clone(),
            self.config.clone(),
            inbound_rx,
            self.transcript_handler.clone(),
            self.notice_handler.clone(),
        )));

        // Initial roster; best-effort like every other fire-and-forget send.
        let _ = self.supervisor.send(&Command::Peers);
        info!(%room, "room membership established");
        Ok(())
    }

    /// Leave the current room: stop any follow, shut the subordinate down,
    /// reset local state.
    pub async fn leave(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.unfollow();
        // Abort the pump before stopping so queued events cannot land in the
        // reset state.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.supervisor.stop().await;
        self.state.lock().reset();
        info!("left room");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Say something into the room. Fire-and-forget: returns as soon as the
    /// command is queued, without waiting for speech completion.
    pub fn speak(&self, text: &str) -> Result<()> {
        self.ensure_connected()?;
        self.supervisor.send(&Command::Speak { text: text.into() })
    }

    /// Absolute move. Ends any autonomous follow – the stepper and explicit
    /// moves share the same send path and cannot be told apart downstream.
    pub fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.ensure_connected()?;
        self.unfollow();
        self.supervisor.send(&Command::Move {
            x,
            y,
            theta: None,
            step: None,
        })?;
        self.state.lock().position = Position::new(x, y);
        Ok(())
    }

    /// Start following the peer whose display name matches `name`
    /// (case-insensitive). Restarts cleanly when already following.
    pub fn follow(&mut self, name: &str) -> Result<()> {
        self.ensure_connected()?;
        let (canonical, seed) = {
            let st = self.state.lock();
            let peer = st
                .find_peer_by_name(name)
                .ok_or_else(|| EngineError::PeerNotFound(name.to_string()))?;
            (peer.name.clone(), peer.position)
        };

        self.unfollow();
        self.state.lock().begin_follow(canonical.clone(), seed);

        let sender = self
            .supervisor
            .sender()
            .ok_or_else(|| EngineError::SendFailure("no subordinate running".into()))?;
        self.stepper = Some(tokio::spawn(run_stepper(
            self.state.clone(),
            sender,
            self.config.clone(),
        )));
        info!(target = %canonical, "following");
        Ok(())
    }

    /// Stop following. Returns whether anyone was being followed.
    pub fn unfollow(&mut self) -> bool {
        if let Some(stepper) = self.stepper.take() {
            stepper.abort();
        }
        self.state.lock().clear_follow()
    }

    /// Request a fresh snapshot from the subordinate, wait the fixed grace
    /// period, then render the current view of the room.
    ///
    /// The fixed wait is a soft synchronization heuristic, not a correlated
    /// request/response: a slow subordinate reply yields a report read from
    /// the previous data.
    pub async fn status(&self) -> Result<StatusReport> {
        self.ensure_connected()?;
        self.supervisor.send(&Command::Status)?;
        let _ = self.supervisor.send(&Command::Peers);
        sleep(self.config.status_grace).await;
        Ok(self.report())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_connected(&self) -> Result<()> {
        if self.state.lock().connected {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }

    fn report(&self) -> StatusReport {
        let st = self.state.lock();
        let mut peers: Vec<PeerStatus> = st
            .peers
            .values()
            .map(|p| {
                let distance = p.position.map(|pos| st.position.distance_to(pos));
                PeerStatus {
                    name: p.name.clone(),
                    position: p.position,
                    distance,
                    in_range: distance.is_some_and(|d| d <= self.config.hearing_radius),
                }
            })
            .collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));

        StatusReport {
            room: st.room.clone(),
            position: st.position,
            hearing_radius: self.config.hearing_radius,
            follow_target: st.follow_target.clone(),
            peers,
            transcripts: st.transcripts.iter().cloned().collect(),
        }
    }
}

impl Drop for RoomEngine {
    fn drop(&mut self) {
        if let Some(stepper) = self.stepper.take() {
            stepper.abort();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

/// Drain the supervisor's inbound stream into the router, delivering routed
/// effects outside the state lock.
async fn run_pump(
    state: Arc<Mutex<RoomState>>,
    config: EngineConfig,
    mut inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    transcript_handler: Handler<Transcript>,
    notice_handler: Handler<Notice>,
) {
    while let Some(inbound) = inbound_rx.recv().await {
        match inbound {
            Inbound::Event(event) => {
                let routed = {
                    let mut st = state.lock();
                    route_event(&mut st, &config, event)
                };
                match routed {
                    Routed::None => {}
                    Routed::Heard(transcript) => {
                        if let Some(handler) = &*transcript_handler.lock() {
                            handler(&transcript);
                        }
                    }
                    Routed::Notice(notice) => {
                        warn!(?notice, "subordinate reported an error");
                        if let Some(handler) = &*notice_handler.lock() {
                            handler(&notice);
                        }
                    }
                }
            }
            Inbound::Closed { code } => {
                let was_connected = {
                    let mut st = state.lock();
                    std::mem::replace(&mut st.connected, false)
                };
                // Silent after a graceful leave; a crash while connected is
                // surfaced but never auto-recovered.
                if was_connected {
                    warn!(?code, "subordinate exited unexpectedly");
                    if let Some(handler) = &*notice_handler.lock() {
                        handler(&Notice::ConnectionLost { code });
                    }
                }
                break;
            }
        }
    }
}
