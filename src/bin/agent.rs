//! room-agent binary
//!
//! Joins a room through the subordinate connection process, logs everything
//! heard within the hearing radius, and optionally follows a named peer.
//!
//! ## Configuration (env / CLI via `clap`)
//!
//! | Key                    | Default       | Description                        |
//! |------------------------|---------------|------------------------------------|
//! | `ROOM_AGENT_ROOM`      | `lobby`       | Room to join                       |
//! | `ROOM_AGENT_NAME`      | `agent`       | Display name announced to the room |
//! | `ROOM_AGENT_VOICE`     | *(none)*      | TTS voice passed to the subordinate|
//! | `ROOM_AGENT_CLIENT`    | `room-client` | Subordinate connection command     |
//! | `ROOM_AGENT_HEARING`   | `150`         | Hearing radius (map units)         |
//! | `ROOM_AGENT_FOLLOW`    | *(none)*      | Peer name to follow on startup     |

use anyhow::Result;
use clap::Parser;
use room_agent::{EngineConfig, RoomEngine};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "room-agent", about = "Room Presence Agent", version)]
struct Args {
    /// Room to join
    #[arg(long, env = "ROOM_AGENT_ROOM", default_value = "lobby")]
    room: String,

    /// Display name announced to the room
    #[arg(long, env = "ROOM_AGENT_NAME", default_value = "agent")]
    name: String,

    /// TTS voice passed through to the subordinate
    #[arg(long, env = "ROOM_AGENT_VOICE")]
    voice: Option<String>,

    /// Subordinate connection command
    #[arg(long, env = "ROOM_AGENT_CLIENT", default_value = "room-client")]
    client: String,

    /// Hearing radius in map units
    #[arg(long, env = "ROOM_AGENT_HEARING", default_value_t = 150.0)]
    hearing_radius: f64,

    /// Comfort distance while following
    #[arg(long, default_value_t = 40.0)]
    follow_distance: f64,

    /// Travel per follow tick in map units
    #[arg(long, default_value_t = 20.0)]
    follow_step: f64,

    /// Peer to start following once joined
    #[arg(long, env = "ROOM_AGENT_FOLLOW")]
    follow: Option<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("room_agent=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    tracing::info!(
        "Starting room-agent (room='{}', name='{}', client='{}', hearing={})",
        args.room,
        args.name,
        args.client,
        args.hearing_radius,
    );

    let config = EngineConfig {
        subordinate_cmd: args.client,
        name: args.name.clone(),
        voice: args.voice,
        hearing_radius: args.hearing_radius,
        follow_distance: args.follow_distance,
        follow_step: args.follow_step,
        ..Default::default()
    };

    let mut engine = RoomEngine::new(config);

    engine.on_transcript(|t| {
        tracing::info!("heard {}: {}", t.name, t.text);
    });
    engine.on_notice(|n| {
        tracing::warn!(?n, "engine notice");
    });

    engine.join(&args.room, Some(&args.name)).await?;

    if let Some(target) = &args.follow {
        // The roster may still be in flight right after join; report status
        // first so the initial peers reply has landed.
        let report = engine.status().await?;
        tracing::info!("\n{}", report);
        if let Err(e) = engine.follow(target) {
            tracing::warn!("cannot follow '{}': {}", target, e);
        }
    }

    // Run until shutdown
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down (SIGINT)");
    engine.leave().await?;
    Ok(())
}
