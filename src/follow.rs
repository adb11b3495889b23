//! Follow-mode navigation – breadcrumb replay.
//!
//! Rather than beelining toward a moving peer (and cutting corners through
//! unmodeled geometry), the engine replays the target's own observed path:
//! the router decimates `peer_moved` updates into a breadcrumb trail (see
//! [`RoomState::record_breadcrumb`]) and the stepper task walks that trail
//! one clamped step per tick.
//!
//! The single authoritative "currently following" flag is
//! `RoomState::follow_target`, checked at the top of every tick; every exit
//! transition out of follow mode clears it, so a stepper can never outlive
//! its follow.

use crate::protocol::Command;
use crate::state::RoomState;
use crate::supervisor::CommandSender;
use crate::types::{EngineConfig, Position};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Step planning
// ---------------------------------------------------------------------------

/// Outcome of one stepper tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepPlan {
    /// Follow mode is over; the stepper must stop.
    Disengage,
    /// Nothing to do this tick (target position unknown).
    Skip,
    /// Within the comfort zone – stand still, do not unfollow.
    Hold,
    /// Move to `to`, facing `theta` radians.
    Advance { to: Position, theta: f64 },
}

/// Plan one follow step against the current room state.
///
/// Pure apart from trail consumption: stale breadcrumbs are discarded as
/// they are passed. Called under the state lock; never blocks.
pub fn plan_step(state: &mut RoomState, config: &EngineConfig) -> StepPlan {
    let Some(target) = state.follow_target.clone() else {
        return StepPlan::Disengage;
    };
    if !state.connected {
        state.clear_follow();
        return StepPlan::Disengage;
    }
    // Target gone from the roster entirely (e.g. wholesale replacement that
    // dropped it) – treat like a departure.
    let Some(peer) = state.find_peer_by_name(&target) else {
        debug!(%target, "follow target no longer resolvable – disengaging");
        state.clear_follow();
        return StepPlan::Disengage;
    };
    let Some(target_pos) = peer.position else {
        return StepPlan::Skip;
    };

    let here = state.position;
    if here.distance_to(target_pos) <= config.follow_distance {
        return StepPlan::Hold;
    }

    // Catch up past stale trail points: while more than one crumb remains
    // and we are already within one step of the oldest, discard it.
    while state.breadcrumbs.len() > 1
        && here.distance_to(state.breadcrumbs[0]) <= config.follow_step
    {
        state.breadcrumbs.pop_front();
    }

    let waypoint = state.breadcrumbs.front().copied().unwrap_or(target_pos);
    let dist = here.distance_to(waypoint);
    if dist == 0.0 {
        // Standing on the only crumb; wait for fresh trail.
        return StepPlan::Skip;
    }

    let travel = config.follow_step.min(dist);
    let dx = waypoint.x - here.x;
    let dy = waypoint.y - here.y;
    let theta = dy.atan2(dx);
    let to = Position::new(
        (here.x + dx / dist * travel).round(),
        (here.y + dy / dist * travel).round(),
    );
    StepPlan::Advance { to, theta }
}

// ---------------------------------------------------------------------------
// Stepper task
// ---------------------------------------------------------------------------

/// Periodic stepper driving the follow. Runs until the plan disengages or
/// the subordinate's input channel closes.
///
/// Lock discipline matches the engine's other tasks: plan under the lock,
/// send outside it, then apply the optimistic position update.
pub(crate) async fn run_stepper(
    state: Arc<Mutex<RoomState>>,
    sender: CommandSender,
    config: EngineConfig,
) {
    let mut ticker = tokio::time::interval(config.follow_tick);
    let mut walking = false;

    loop {
        ticker.tick().await;

        let plan = {
            let mut st = state.lock();
            plan_step(&mut st, &config)
        };

        match plan {
            StepPlan::Disengage => break,
            StepPlan::Skip => continue,
            StepPlan::Hold => {
                // One stationary signal per arrival, not one per tick.
                if walking {
                    walking = false;
                    let here = state.lock().position;
                    let stop = Command::Move {
                        x: here.x,
                        y: here.y,
                        theta: None,
                        step: Some(0.0),
                    };
                    if sender.send(&stop).is_err() {
                        break;
                    }
                }
            }
            StepPlan::Advance { to, theta } => {
                let step = Command::Move {
                    x: to.x,
                    y: to.y,
                    theta: Some(theta),
                    step: Some(config.follow_step),
                };
                if sender.send(&step).is_err() {
                    break;
                }
                // Optimistic – applied before any acknowledgement.
                state.lock().position = to;
                walking = true;
            }
        }
    }

    debug!("follow stepper stopped");
}
