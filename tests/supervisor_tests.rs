//! ConnectionSupervisor integration tests
//!
//! The subordinate is faked with `sh -c` scripts that speak the
//! line-delimited JSON protocol on stdout.

#[cfg(test)]
mod tests {
    use room_agent::protocol::{Command, Event};
    use room_agent::supervisor::{ConnectionSupervisor, Inbound, SubordinateOptions};
    use room_agent::EngineError;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};
    use tokio_test::assert_ok;

    const JOINED_LINE: &str = r#"echo '{"event":"joined","room":"lobby","peerId":"p1"}'"#;

    fn fake(script: &str, join_timeout_ms: u64) -> ConnectionSupervisor {
        ConnectionSupervisor::new(
            "sh",
            vec!["-c".into(), script.into()],
            Duration::from_millis(join_timeout_ms),
            Duration::from_millis(50),
        )
    }

    fn opts() -> SubordinateOptions {
        SubordinateOptions {
            name: "agent".into(),
            voice: None,
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Inbound>) -> Inbound {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for inbound")
            .expect("inbound stream closed")
    }

    // -----------------------------------------------------------------------
    // Start / join-wait
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn start_resolves_once_joined_is_observed() {
        let mut sup = fake(&format!("{JOINED_LINE}; sleep 10"), 5000);
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio_test::assert_ok!(sup.start("lobby", &opts(), tx).await);
        assert!(sup.is_running());
        assert!(sup.is_ready());

        match next_event(&mut rx).await {
            Inbound::Event(Event::Joined { room, peer_id }) => {
                assert_eq!(room, "lobby");
                assert_eq!(peer_id, "p1");
            }
            other => panic!("expected joined, got {:?}", other),
        }

        sup.stop().await;
    }

    #[tokio::test]
    async fn second_start_fails_while_running() {
        let mut sup = fake(&format!("{JOINED_LINE}; sleep 10"), 5000);
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.start("lobby", &opts(), tx).await.unwrap();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        match sup.start("lobby", &opts(), tx2).await {
            Err(EngineError::AlreadyRunning) => {}
            other => panic!("expected AlreadyRunning, got {:?}", other.err()),
        }

        sup.stop().await;
    }

    #[tokio::test]
    async fn unlaunchable_command_is_a_spawn_failure() {
        let mut sup = ConnectionSupervisor::new(
            "/definitely/not/a/real/binary",
            vec![],
            Duration::from_secs(1),
            Duration::from_millis(50),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        match sup.start("lobby", &opts(), tx).await {
            Err(EngineError::SpawnFailure(_)) => {}
            other => panic!("expected SpawnFailure, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn silent_subordinate_times_out_and_is_killed() {
        let mut sup = fake("sleep 10", 200);
        let (tx, _rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        match sup.start("lobby", &opts(), tx).await {
            Err(EngineError::SpawnTimeout(_)) => {}
            other => panic!("expected SpawnTimeout, got {:?}", other.err()),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
        // The kill is asynchronous; give the reaper a beat.
        sleep(Duration::from_millis(300)).await;
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn exit_before_joined_is_a_spawn_failure() {
        let mut sup = fake("exit 0", 5000);
        let (tx, _rx) = mpsc::unbounded_channel();
        match sup.start("lobby", &opts(), tx).await {
            Err(EngineError::SpawnFailure(_)) => {}
            other => panic!("expected SpawnFailure, got {:?}", other.err()),
        }
    }

    // -----------------------------------------------------------------------
    // Inbound stream
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn malformed_lines_are_discarded() {
        let script = format!(
            "{JOINED_LINE}; echo 'not json at all'; echo '{{\"truncated'; \
             echo '{{\"event\":\"peer_join\",\"id\":\"d\",\"name\":\"David\"}}'; sleep 10"
        );
        let mut sup = fake(&script, 5000);
        let (tx, mut rx) = mpsc::unbounded_channel();
        sup.start("lobby", &opts(), tx).await.unwrap();

        assert!(matches!(
            next_event(&mut rx).await,
            Inbound::Event(Event::Joined { .. })
        ));
        // The two garbage lines never surface.
        match next_event(&mut rx).await {
            Inbound::Event(Event::PeerJoin { id, name, .. }) => {
                assert_eq!(id, "d");
                assert_eq!(name, "David");
            }
            other => panic!("expected peer_join, got {:?}", other),
        }

        sup.stop().await;
    }

    #[tokio::test]
    async fn unexpected_exit_reports_the_code() {
        let mut sup = fake(&format!("{JOINED_LINE}; sleep 0.3; exit 7"), 5000);
        let (tx, mut rx) = mpsc::unbounded_channel();
        sup.start("lobby", &opts(), tx).await.unwrap();

        assert!(matches!(
            next_event(&mut rx).await,
            Inbound::Event(Event::Joined { .. })
        ));
        match next_event(&mut rx).await {
            Inbound::Closed { code } => assert_eq!(code, Some(7)),
            other => panic!("expected Closed, got {:?}", other),
        }
    }

    // -----------------------------------------------------------------------
    // Send path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn send_reaches_the_subordinate_stdin() {
        let out = std::env::temp_dir().join(format!("room-agent-sup-{}.ndjson", std::process::id()));
        let script = format!("{JOINED_LINE}; cat > \"{}\"", out.display());
        let mut sup = fake(&script, 5000);
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.start("lobby", &opts(), tx).await.unwrap();

        sup.send(&Command::Speak {
            text: "hello room".into(),
        })
        .unwrap();
        sleep(Duration::from_millis(300)).await;

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains(r#""action":"speak""#), "got: {written}");
        assert!(written.contains("hello room"));

        sup.stop().await;
        let _ = std::fs::remove_file(&out);
    }

    #[tokio::test]
    async fn send_fails_after_stop() {
        let mut sup = fake(&format!("{JOINED_LINE}; sleep 10"), 5000);
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.start("lobby", &opts(), tx).await.unwrap();
        sup.stop().await;

        match sup.send(&Command::Peers) {
            Err(EngineError::SendFailure(_)) => {}
            other => panic!("expected SendFailure, got {:?}", other.err()),
        }
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn send_fails_when_never_started() {
        let sup = fake("sleep 10", 200);
        assert!(matches!(
            sup.send(&Command::Peers),
            Err(EngineError::SendFailure(_))
        ));
    }
}
