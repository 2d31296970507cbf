use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use crate::player::monitor::Monitor;
use crate::player::{PlaybackError, PlayerCommand, PlayerProcess};

const TERMINATE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackTimings {
    /// How long a player gets to exit after SIGTERM before it is killed.
    pub grace_period_ms: u64,
    /// Interval between exit checks of the background monitor.
    pub monitor_poll_ms: u64,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            grace_period_ms: 100,
            monitor_poll_ms: 100,
        }
    }
}

impl PlaybackTimings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn monitor_poll(&self) -> Duration {
        Duration::from_millis(self.monitor_poll_ms.max(1))
    }
}

/// State shared between the controller and its monitor.
#[derive(Debug, Default)]
pub(crate) struct PlaybackState {
    pub process: Option<PlayerProcess>,
    pub playing: bool,
    pub paused: bool,
    pub current_file: Option<PathBuf>,
}

impl PlaybackState {
    /// The process is gone. The current file stays so the caller can tell a
    /// natural end apart from an explicit stop.
    pub fn clear_process(&mut self) {
        self.process = None;
        self.playing = false;
        self.paused = false;
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Plays one file at a time through an external player process.
///
/// Pause and resume suspend and continue the whole process since the player
/// itself has no pause control. A monitor thread reaps the process when it
/// exits on its own; callers poll [`is_finished`](Self::is_finished) or
/// [`is_process_alive`](Self::is_process_alive) to notice the end of a track.
///
/// Every mutating call holds the monitor slot for its whole duration, which
/// serializes them against each other. The state lock is shared with the
/// monitor thread.
pub struct PlaybackController {
    command: PlayerCommand,
    timings: PlaybackTimings,
    state: Arc<Mutex<PlaybackState>>,
    monitor: Mutex<Option<Monitor>>,
}

impl PlaybackController {
    pub fn new(command: PlayerCommand, timings: PlaybackTimings) -> Self {
        Self {
            command,
            timings,
            state: Arc::new(Mutex::new(PlaybackState::default())),
            monitor: Mutex::new(None),
        }
    }

    /// Stop whatever is playing and start `file`.
    pub fn play(&self, file: impl AsRef<Path>) -> Result<(), PlaybackError> {
        let file = file.as_ref();
        let mut monitor = lock(&self.monitor);
        self.teardown(&mut monitor)?;

        let process = PlayerProcess::spawn(&self.command, file).map_err(|e| {
            log::error!("Failed to start playback of {}: {}", file.display(), e);
            e
        })?;
        let pid = process.id();

        {
            let mut state = lock(&self.state);
            state.process = Some(process);
            state.current_file = Some(file.to_path_buf());
            state.playing = true;
            state.paused = false;
        }

        match Monitor::start(Arc::clone(&self.state), pid, self.timings.monitor_poll()) {
            Ok(started) => *monitor = Some(started),
            Err(source) => {
                log::error!("Failed to start monitor for player process {}: {}", pid, source);
                self.teardown(&mut monitor)?;
                return Err(PlaybackError::Spawn {
                    program: self.command.program.clone(),
                    source,
                });
            }
        }

        log::info!("Playing {} (pid {})", file.display(), pid);
        Ok(())
    }

    /// Suspend the player. A no-op unless actively playing.
    pub fn pause(&self) {
        let _monitor = lock(&self.monitor);
        let mut state = lock(&self.state);
        if !state.playing || state.paused {
            return;
        }

        if let Some(process) = state.process.as_ref() {
            match process.suspend() {
                Ok(()) => {
                    log::info!("Paused player process {}", process.id());
                    state.playing = false;
                    state.paused = true;
                }
                // The monitor reconciles the exit on its next poll.
                Err(e) => log::debug!("Pause of player process {} failed: {}", process.id(), e),
            }
        }
    }

    /// Continue a suspended player. A no-op unless paused.
    pub fn resume(&self) {
        let _monitor = lock(&self.monitor);
        let mut state = lock(&self.state);
        if !state.paused {
            return;
        }

        if let Some(process) = state.process.as_ref() {
            match process.resume() {
                Ok(()) => {
                    log::info!("Resumed player process {}", process.id());
                    state.playing = true;
                    state.paused = false;
                }
                Err(e) => log::debug!("Resume of player process {} failed: {}", process.id(), e),
            }
        }
    }

    /// Terminate the player and reap it. Safe to call when idle.
    ///
    /// Only fails if the process survives a forced kill.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        let mut monitor = lock(&self.monitor);
        self.teardown(&mut monitor)
    }

    pub fn is_playing(&self) -> bool {
        let state = lock(&self.state);
        state.playing && state.process.is_some()
    }

    pub fn is_paused(&self) -> bool {
        let state = lock(&self.state);
        state.paused && state.process.is_some()
    }

    /// A process is owned, playing or paused.
    pub fn is_active(&self) -> bool {
        lock(&self.state).process.is_some()
    }

    /// A track was started and has ended without `stop` being called.
    pub fn is_finished(&self) -> bool {
        let state = lock(&self.state);
        state.current_file.is_some() && state.process.is_none()
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        lock(&self.state).current_file.clone()
    }

    pub fn process_id(&self) -> Option<u32> {
        lock(&self.state).process.as_ref().map(PlayerProcess::id)
    }

    /// Whether the owned process can still be signalled. Does not reap.
    pub fn is_process_alive(&self) -> bool {
        lock(&self.state)
            .process
            .as_ref()
            .is_some_and(PlayerProcess::is_signalable)
    }

    fn teardown(&self, monitor: &mut Option<Monitor>) -> Result<(), PlaybackError> {
        // Retired before the state lock is taken; the monitor needs it to exit.
        if let Some(running) = monitor.take() {
            running.retire();
        }

        let mut state = lock(&self.state);
        let result = match state.process.take() {
            Some(mut process) => self.terminate(&mut process),
            None => Ok(()),
        };

        state.playing = false;
        state.paused = false;
        state.current_file = None;
        result
    }

    fn terminate(&self, process: &mut PlayerProcess) -> Result<(), PlaybackError> {
        let pid = process.id();
        if process.is_reaped() {
            return Ok(());
        }

        if let Err(e) = process.request_terminate() {
            log::debug!("SIGTERM to player process {} failed: {}", pid, e);
        }

        let grace = self.timings.grace_period();
        let deadline = Instant::now() + grace;
        loop {
            match process.try_exit() {
                Ok(Some(status)) => {
                    log::info!("Stopped player process {} ({})", pid, status);
                    return Ok(());
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep(TERMINATE_POLL.min(deadline - now));
                }
                Err(e) => {
                    // Nothing left to reap.
                    log::warn!("Error waiting for player process {}: {}", pid, e);
                    return Ok(());
                }
            }
        }

        log::warn!("Player process {} still running after {:?}, force killing", pid, grace);
        process
            .force_kill()
            .and_then(|()| process.wait())
            .map(|status| log::info!("Killed player process {} ({})", pid, status))
            .map_err(|source| {
                log::error!("Failed to kill player process {}: {}", pid, source);
                PlaybackError::Unkillable { pid, source }
            })
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Failed to stop playback on shutdown: {}", e);
        }
    }
}
