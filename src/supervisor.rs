//! Subordinate-process supervision.
//!
//! `ConnectionSupervisor` owns the lifecycle of exactly one subordinate
//! real-time connection process per engine instance: it launches the
//! process, frames its stdout into protocol events, and accepts typed
//! commands to write to its stdin.
//!
//! Three tasks per subordinate:
//!
//! - **reader** – lines child stdout, parses each line independently,
//!   forwards events, reaps the child on stream end;
//! - **writer** – owns child stdin, drains an unbounded line channel;
//! - the caller's pump task consumes the [`Inbound`] stream.
//!
//! There is no auto-restart: an unexpected exit surfaces as
//! [`Inbound::Closed`] with the exit code and it is the caller's
//! responsibility to re-initiate `start`.

use crate::error::{EngineError, Result};
use crate::protocol::{self, Command, Event};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Inbound stream
// ---------------------------------------------------------------------------

/// What the reader task delivers to the engine's pump.
#[derive(Debug)]
pub enum Inbound {
    /// One parsed protocol event, in stdout line order.
    Event(Event),
    /// The subordinate's stdout closed and the process was reaped.
    /// Not emitted on a deliberate `stop()`.
    Closed { code: Option<i32> },
}

/// Launch options beyond the room id.
#[derive(Debug, Clone)]
pub struct SubordinateOptions {
    pub name: String,
    pub voice: Option<String>,
}

// ---------------------------------------------------------------------------
// Command sender
// ---------------------------------------------------------------------------

/// Cloneable handle for writing commands to the active subordinate.
///
/// The follow stepper holds one of these so it can emit moves without going
/// through the supervisor.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandSender {
    /// Encode and queue one command line. Fails once the subordinate's
    /// input channel has closed.
    pub fn send(&self, command: &Command) -> Result<()> {
        self.tx
            .send(protocol::encode_command(command))
            .map_err(|_| EngineError::SendFailure("subordinate input channel closed".into()))
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct ConnectionSupervisor {
    command: String,
    base_args: Vec<String>,
    join_timeout: Duration,
    stop_grace: Duration,
    inner: Option<Subordinate>,
}

struct Subordinate {
    writer_tx: mpsc::UnboundedSender<String>,
    kill_tx: Option<oneshot::Sender<()>>,
    ready_rx: watch::Receiver<bool>,
    reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl ConnectionSupervisor {
    pub fn new(
        command: impl Into<String>,
        base_args: Vec<String>,
        join_timeout: Duration,
        stop_grace: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            base_args,
            join_timeout,
            stop_grace,
            inner: None,
        }
    }

    /// Launch the subordinate for `room` and wait for its `joined` event.
    ///
    /// Parsed events stream into `inbound_tx` in stdout line order. Fails
    /// with [`EngineError::AlreadyRunning`] when a live subordinate exists,
    /// [`EngineError::SpawnFailure`] when the process cannot be launched or
    /// exits before joining, and [`EngineError::SpawnTimeout`] when no
    /// `joined` event arrives within the wait window (the child is killed
    /// in that case).
    pub async fn start(
        &mut self,
        room: &str,
        options: &SubordinateOptions,
        inbound_tx: mpsc::UnboundedSender<Inbound>,
    ) -> Result<()> {
        match &self.inner {
            Some(sub) if !sub.reader.is_finished() => return Err(EngineError::AlreadyRunning),
            Some(_) => {
                // Previous subordinate died; clear the stale handle.
                self.inner = None;
            }
            None => {}
        }

        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.base_args)
            .arg("--room")
            .arg(room)
            .arg("--name")
            .arg(&options.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(voice) = &options.voice {
            cmd.arg("--voice").arg(voice);
        }

        info!(command = %self.command, %room, name = %options.name, "launching subordinate");
        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::SpawnFailure(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::SpawnFailure("subordinate stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::SpawnFailure("subordinate stdout unavailable".into()))?;

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<String>();
        let (ready_tx, ready_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel();

        let writer = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = writer_rx.recv().await {
                if line.is_empty() {
                    continue;
                }
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    warn!("subordinate stdin closed; dropping outbound commands");
                    break;
                }
            }
        });

        let reader = tokio::spawn(read_loop(child, stdout, inbound_tx, ready_tx, kill_rx));

        let mut ready = ready_rx.clone();
        let sub = Subordinate {
            writer_tx,
            kill_tx: Some(kill_tx),
            ready_rx,
            reader,
            _writer: writer,
        };

        let result = match timeout(self.join_timeout, ready.wait_for(|r| *r)).await {
            // Joined observed on the stream.
            Ok(Ok(_)) => {
                self.inner = Some(sub);
                Ok(())
            }
            // Readiness channel gone: the process exited before joining.
            Ok(Err(_)) => {
                debug!("subordinate exited before reporting joined");
                Err(EngineError::SpawnFailure(
                    "subordinate exited before joining".into(),
                ))
            }
            Err(_) => {
                warn!(timeout = ?self.join_timeout, "no joined event – killing subordinate");
                let mut sub = sub;
                if let Some(kill) = sub.kill_tx.take() {
                    let _ = kill.send(());
                }
                Err(EngineError::SpawnTimeout(self.join_timeout))
            }
        };
        result
    }

    /// Queue one command for the subordinate's stdin.
    pub fn send(&self, command: &Command) -> Result<()> {
        let sub = self
            .inner
            .as_ref()
            .ok_or_else(|| EngineError::SendFailure("no subordinate running".into()))?;
        sub.writer_tx
            .send(protocol::encode_command(command))
            .map_err(|_| EngineError::SendFailure("subordinate input channel closed".into()))
    }

    /// A cloneable sender for the active subordinate, if any.
    pub fn sender(&self) -> Option<CommandSender> {
        self.inner.as_ref().map(|sub| CommandSender {
            tx: sub.writer_tx.clone(),
        })
    }

    /// True while a subordinate process is alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|sub| !sub.reader.is_finished())
    }

    /// True between the `joined` and `left` events of the current process.
    pub fn is_ready(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|sub| *sub.ready_rx.borrow())
    }

    /// Best-effort graceful shutdown: send `leave` (ignoring failure – the
    /// process may already be gone), wait the grace period, then terminate
    /// unconditionally and clear supervisor state.
    pub async fn stop(&mut self) {
        let Some(mut sub) = self.inner.take() else {
            return;
        };
        let _ = sub
            .writer_tx
            .send(protocol::encode_command(&Command::Leave));
        sleep(self.stop_grace).await;
        if let Some(kill) = sub.kill_tx.take() {
            let _ = kill.send(());
        }
        debug!("subordinate stopped");
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

/// Line the subordinate's stdout until it closes or a kill is requested.
///
/// Owns the child handle so the exit status can be reaped exactly once.
/// A deliberate kill suppresses the [`Inbound::Closed`] notification.
async fn read_loop(
    mut child: Child,
    stdout: ChildStdout,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    ready_tx: watch::Sender<bool>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let mut lines = BufReader::new(stdout).lines();

    let killed = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(event) = protocol::parse_event(&line) else {
                        continue;
                    };
                    match &event {
                        Event::Joined { .. } => {
                            let _ = ready_tx.send(true);
                        }
                        Event::Left => {
                            let _ = ready_tx.send(false);
                        }
                        _ => {}
                    }
                    if inbound_tx.send(Inbound::Event(event)).is_err() {
                        // Nobody is listening any more; shut the child down.
                        break true;
                    }
                }
                Ok(None) | Err(_) => break false,
            },
            _ = &mut kill_rx => break true,
        }
    };

    let _ = ready_tx.send(false);

    if killed {
        let _ = child.start_kill();
        let _ = child.wait().await;
        return;
    }

    // Stream ended on its own: reap and report the exit.
    let code = child.wait().await.ok().and_then(|status| status.code());
    info!(?code, "subordinate process exited");
    let _ = inbound_tx.send(Inbound::Closed { code });
}
