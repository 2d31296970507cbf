use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use crate::player::{PlaybackController, PlaybackError, PlaybackTimings, PlayerCommand};

fn fast_timings() -> PlaybackTimings {
    PlaybackTimings {
        grace_period_ms: 100,
        monitor_poll_ms: 20,
    }
}

/// `sleep <file>`: the "track" is the number of seconds to play.
fn sleeper() -> PlaybackController {
    PlaybackController::new(PlayerCommand::new("sleep"), fast_timings())
}

/// Runs `script` through `sh`; the track path becomes `$1`.
fn shell_player(script: &str) -> PlaybackController {
    let command = PlayerCommand::new("sh").with_args(["-c", script, "player"]);
    PlaybackController::new(command, fast_timings())
}

fn pid_exists(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_new_controller_is_idle() {
    let player = sleeper();
    assert!(!player.is_playing());
    assert!(!player.is_paused());
    assert!(!player.is_active());
    assert!(!player.is_finished());
    assert!(!player.is_process_alive());
    assert!(player.current_file().is_none());
    assert!(player.process_id().is_none());
}

#[test]
fn test_play_valid_track() {
    let player = shell_player("sleep 5");
    player.play("track1.mp3").expect("play should succeed");

    assert!(player.is_playing());
    assert!(!player.is_paused());
    assert!(player.is_active());
    assert!(player.is_process_alive());
    assert_eq!(player.current_file(), Some(PathBuf::from("track1.mp3")));

    player.stop().unwrap();
}

#[test]
fn test_play_with_missing_binary_reports_spawn_error() {
    let player = PlaybackController::new(
        PlayerCommand::ffplay("/nonexistent/bin/ffplay"),
        fast_timings(),
    );
    let result = player.play("missing.mp3");

    assert!(matches!(result, Err(PlaybackError::Spawn { .. })));
    assert!(!player.is_active());
    assert!(!player.is_playing());
    assert!(!player.is_finished());
    assert!(player.current_file().is_none());
}

#[test]
fn test_natural_exit_is_detected_without_stop() {
    let player = sleeper();
    player.play("0.2").unwrap();
    let pid = player.process_id().unwrap();

    assert!(wait_until(Duration::from_secs(3), || !player.is_active()));
    assert!(!player.is_process_alive());
    assert!(!player.is_playing());
    assert!(!player.is_paused());
    assert!(player.is_finished());
    assert_eq!(player.current_file(), Some(PathBuf::from("0.2")));
    assert!(!pid_exists(pid), "monitor should have reaped the player");

    player.stop().unwrap();
    assert!(!player.is_finished());
    assert!(player.current_file().is_none());
}

#[test]
fn test_pause_then_resume() {
    let player = sleeper();
    player.play("5").unwrap();
    let pid = player.process_id();

    player.pause();
    assert!(player.is_paused());
    assert!(!player.is_playing());
    assert!(player.is_active());
    assert!(player.is_process_alive());

    player.resume();
    assert!(player.is_playing());
    assert!(!player.is_paused());
    assert_eq!(player.current_file(), Some(PathBuf::from("5")));
    assert_eq!(player.process_id(), pid);

    player.stop().unwrap();
}

#[test]
fn test_second_pause_is_noop() {
    let player = sleeper();
    player.play("5").unwrap();
    let pid = player.process_id();

    player.pause();
    player.pause();

    assert!(player.is_paused());
    assert!(!player.is_playing());
    assert_eq!(player.process_id(), pid);
    assert_eq!(player.current_file(), Some(PathBuf::from("5")));

    player.stop().unwrap();
}

#[test]
fn test_resume_while_playing_is_noop() {
    let player = sleeper();
    player.play("5").unwrap();

    player.resume();
    assert!(player.is_playing());
    assert!(!player.is_paused());

    player.stop().unwrap();
}

#[test]
fn test_pause_and_resume_when_idle_are_noops() {
    let player = sleeper();
    player.pause();
    player.resume();
    assert!(!player.is_active());
    assert!(!player.is_paused());
}

#[test]
fn test_pause_after_natural_exit_is_noop() {
    let player = sleeper();
    player.play("0.1").unwrap();
    assert!(wait_until(Duration::from_secs(3), || !player.is_active()));

    player.pause();
    assert!(!player.is_paused());
    assert!(!player.is_playing());
}

#[test]
fn test_stop_reaps_process() {
    let player = sleeper();
    player.play("5").unwrap();
    let pid = player.process_id().unwrap();
    assert!(pid_exists(pid));

    player.stop().unwrap();

    assert!(!pid_exists(pid));
    assert!(!player.is_active());
    assert!(!player.is_playing());
    assert!(!player.is_paused());
    assert!(!player.is_finished());
    assert!(player.current_file().is_none());
}

#[test]
fn test_stop_is_idempotent() {
    let player = sleeper();
    player.stop().unwrap();
    player.play("5").unwrap();
    player.stop().unwrap();
    player.stop().unwrap();
    assert!(!player.is_active());
}

#[test]
fn test_stop_while_paused() {
    let player = sleeper();
    player.play("5").unwrap();
    let pid = player.process_id().unwrap();
    player.pause();

    player.stop().unwrap();

    assert!(!pid_exists(pid));
    assert!(!player.is_paused());
}

#[test]
fn test_stop_escalates_when_player_ignores_terminate() {
    let player = shell_player("trap '' TERM; exec sleep 5");
    player.play("stubborn.mp3").unwrap();
    let pid = player.process_id().unwrap();
    // Give the shell time to install the trap before it execs.
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    player.stop().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!pid_exists(pid));
    assert!(player.current_file().is_none());
}

#[test]
fn test_play_replaces_previous_process() {
    let player = sleeper();
    player.play("5").unwrap();
    let first = player.process_id().unwrap();

    player.play("6").unwrap();
    let second = player.process_id().unwrap();

    assert_ne!(first, second);
    assert!(!pid_exists(first), "previous player must be reaped");
    assert!(pid_exists(second));
    assert!(player.is_playing());
    assert_eq!(player.current_file(), Some(PathBuf::from("6")));

    player.stop().unwrap();
}

#[test]
fn test_play_from_paused_starts_fresh() {
    let player = sleeper();
    player.play("5").unwrap();
    player.pause();

    player.play("6").unwrap();
    assert!(player.is_playing());
    assert!(!player.is_paused());

    player.stop().unwrap();
}

#[test]
fn test_drop_stops_playback() {
    let pid = {
        let player = sleeper();
        player.play("5").unwrap();
        player.process_id().unwrap()
    };
    assert!(!pid_exists(pid));
}

#[test]
fn test_concurrent_callers_never_leak_processes() {
    let player = Arc::new(sleeper());
    let mut handles = Vec::new();

    for worker in 0..4 {
        let player = Arc::clone(&player);
        handles.push(thread::spawn(move || {
            let mut seen = Vec::new();
            for round in 0..8 {
                match (worker + round) % 4 {
                    0 | 1 => {
                        player.play("5").unwrap();
                    }
                    2 => player.pause(),
                    _ => player.stop().unwrap(),
                }
                if let Some(pid) = player.process_id() {
                    seen.push(pid);
                }
            }
            seen
        }));
    }

    let mut seen = Vec::new();
    for handle in handles {
        seen.extend(handle.join().unwrap());
    }

    player.stop().unwrap();
    for pid in seen {
        assert!(!pid_exists(pid), "player process {} leaked", pid);
    }
}
