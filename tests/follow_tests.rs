//! Follow-engine step-planning tests

#[cfg(test)]
mod tests {
    use room_agent::follow::{plan_step, StepPlan};
    use room_agent::state::RoomState;
    use room_agent::types::{EngineConfig, Peer, Position};

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    fn config() -> EngineConfig {
        EngineConfig {
            follow_distance: 40.0,
            follow_step: 20.0,
            ..Default::default()
        }
    }

    /// Connected state following `target_name`, target at `target_pos`.
    fn following(self_pos: Position, target_name: &str, target_pos: Option<Position>) -> RoomState {
        let mut st = RoomState::new();
        st.connected = true;
        st.room = Some("lobby".into());
        st.position = self_pos;
        st.upsert_peer(Peer {
            id: "d".into(),
            name: target_name.into(),
            position: target_pos,
        });
        st.begin_follow(target_name.into(), target_pos);
        st
    }

    // -----------------------------------------------------------------------
    // First tick of the reference scenario
    // -----------------------------------------------------------------------

    #[test]
    fn first_tick_moves_one_step_toward_the_target() {
        // David at (300,300), self at (250,230): ~86 units apart, outside the
        // 40-unit comfort zone, so the step advances ~20 units along the ray.
        let mut st = following(p(250.0, 230.0), "David", Some(p(300.0, 300.0)));

        match plan_step(&mut st, &config()) {
            StepPlan::Advance { to, theta } => {
                let moved = p(250.0, 230.0).distance_to(to);
                assert!(
                    (moved - 20.0).abs() <= 1.0,
                    "expected ~20 units of travel, got {moved}"
                );
                // Integer-rounded coordinates.
                assert_eq!(to.x, to.x.round());
                assert_eq!(to.y, to.y.round());
                assert_eq!(to, p(262.0, 246.0));
                // Heading up-right.
                assert!(theta > 0.0 && theta < std::f64::consts::FRAC_PI_2);
            }
            other => panic!("expected Advance, got {:?}", other),
        }
    }

    #[test]
    fn repeated_ticks_converge_into_the_comfort_zone() {
        let mut st = following(p(250.0, 230.0), "David", Some(p(300.0, 300.0)));
        let cfg = config();

        for _ in 0..20 {
            match plan_step(&mut st, &cfg) {
                StepPlan::Advance { to, .. } => st.position = to,
                StepPlan::Hold => {
                    assert!(st.position.distance_to(p(300.0, 300.0)) <= cfg.follow_distance);
                    return;
                }
                other => panic!("unexpected plan {:?}", other),
            }
        }
        panic!("never reached the comfort zone");
    }

    // -----------------------------------------------------------------------
    // Terminal / degenerate ticks
    // -----------------------------------------------------------------------

    #[test]
    fn within_comfort_zone_holds_without_unfollowing() {
        let mut st = following(p(290.0, 300.0), "David", Some(p(300.0, 300.0)));
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Hold);
        // Close enough is a per-tick sub-state, not a reason to unfollow.
        assert_eq!(st.follow_target.as_deref(), Some("David"));
    }

    #[test]
    fn unknown_target_position_skips_the_tick() {
        let mut st = following(p(0.0, 0.0), "David", None);
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Skip);
        assert_eq!(st.follow_target.as_deref(), Some("David"));
    }

    #[test]
    fn no_target_disengages() {
        let mut st = RoomState::new();
        st.connected = true;
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Disengage);
    }

    #[test]
    fn disconnect_disengages_and_clears_follow() {
        let mut st = following(p(0.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.connected = false;
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Disengage);
        assert!(st.follow_target.is_none());
    }

    #[test]
    fn target_gone_from_roster_disengages_and_clears_follow() {
        let mut st = following(p(0.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.peers.clear();
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Disengage);
        assert!(st.follow_target.is_none());
        assert!(st.breadcrumbs.is_empty());
    }

    // -----------------------------------------------------------------------
    // Waypoint selection
    // -----------------------------------------------------------------------

    #[test]
    fn stale_breadcrumbs_are_skipped_without_stalling() {
        let mut st = following(p(0.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.breadcrumbs.clear();
        for x in [5.0, 10.0, 100.0] {
            st.breadcrumbs.push_back(p(x, 0.0));
        }

        match plan_step(&mut st, &config()) {
            StepPlan::Advance { to, .. } => assert_eq!(to, p(20.0, 0.0)),
            other => panic!("expected Advance, got {:?}", other),
        }
        // The two crumbs within one step were consumed.
        assert_eq!(st.breadcrumbs.len(), 1);
        assert_eq!(st.breadcrumbs.front().copied(), Some(p(100.0, 0.0)));
    }

    #[test]
    fn travel_is_clamped_to_the_waypoint() {
        let mut st = following(p(0.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.breadcrumbs.clear();
        st.breadcrumbs.push_back(p(15.0, 0.0));

        match plan_step(&mut st, &config()) {
            // 15 < follow_step: stop on the crumb, do not overshoot.
            StepPlan::Advance { to, .. } => assert_eq!(to, p(15.0, 0.0)),
            other => panic!("expected Advance, got {:?}", other),
        }
    }

    #[test]
    fn empty_trail_heads_straight_for_the_target() {
        let mut st = following(p(0.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.breadcrumbs.clear();
        match plan_step(&mut st, &config()) {
            StepPlan::Advance { to, .. } => assert_eq!(to, p(20.0, 0.0)),
            other => panic!("expected Advance, got {:?}", other),
        }
    }

    #[test]
    fn standing_on_the_last_crumb_skips() {
        let mut st = following(p(50.0, 0.0), "David", Some(p(100.0, 0.0)));
        st.breadcrumbs.clear();
        st.breadcrumbs.push_back(p(50.0, 0.0));
        assert_eq!(plan_step(&mut st, &config()), StepPlan::Skip);
    }
}
