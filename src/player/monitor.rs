use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crate::player::controller::{lock, PlaybackState};

/// Background watcher bound to one player process.
///
/// It is the only place that reaps a process which exits on its own. The
/// controller retires it before touching the process itself.
pub(crate) struct Monitor {
    pid: u32,
    retire: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Monitor {
    pub fn start(state: Arc<Mutex<PlaybackState>>, pid: u32, poll: Duration) -> io::Result<Self> {
        let retire = Arc::new(AtomicBool::new(false));
        let retire_flag = Arc::clone(&retire);

        let handle = thread::Builder::new()
            .name(format!("player-monitor-{}", pid))
            .spawn(move || watch(&state, pid, &retire_flag, poll))?;

        log::debug!("Monitor started for player process {}", pid);
        Ok(Self { pid, retire, handle })
    }

    /// Tell the watcher to stop and wait for it to finish.
    pub fn retire(self) {
        self.retire.store(true, Ordering::Release);
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            log::warn!("Monitor for player process {} panicked", self.pid);
        }
    }
}

fn watch(state: &Mutex<PlaybackState>, pid: u32, retire: &AtomicBool, poll: Duration) {
    while !retire.load(Ordering::Acquire) {
        {
            let mut state = lock(state);
            // Re-checked under the lock: a retiring controller owns the process now.
            if retire.load(Ordering::Acquire) {
                break;
            }

            let Some(process) = state.process.as_mut().filter(|p| p.id() == pid) else {
                break;
            };

            match process.try_exit() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    log::info!("Player process {} exited ({})", pid, status);
                    state.clear_process();
                    break;
                }
                Err(e) => {
                    log::warn!("Error waiting for player process {}: {}", pid, e);
                    state.clear_process();
                    break;
                }
            }
        }

        thread::park_timeout(poll);
    }

    log::debug!("Monitor for player process {} exiting", pid);
}
