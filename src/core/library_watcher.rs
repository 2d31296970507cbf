use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tokio::sync::broadcast;
use crate::core::library::is_playable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryChange {
    Added(PathBuf),
    Removed(PathBuf),
}

/// Watches the music folder so downloads and deletions show up without a
/// manual refresh.
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
}

impl LibraryWatcher {
    pub fn new(directory: &Path) -> anyhow::Result<(Self, broadcast::Receiver<LibraryChange>)> {
        let (tx, rx) = mpsc::channel();
        let (event_sender, event_receiver) = broadcast::channel(32);

        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(directory, RecursiveMode::Recursive)?;

        thread::spawn(move || {
            while let Ok(event) = rx.recv() {
                match event {
                    Ok(event) => {
                        for change in classify(event) {
                            log::debug!("Library change: {:?}", change);
                            // No receivers just means nobody is listening yet.
                            let _ = event_sender.send(change);
                        }
                    }
                    Err(e) => log::warn!("Library watch error: {}", e),
                }
            }
            log::debug!("Library watcher thread exiting");
        });

        log::info!("Watching {} for new tracks", directory.display());
        Ok((
            LibraryWatcher { _watcher: watcher },
            event_receiver,
        ))
    }
}

fn classify(event: Event) -> Vec<LibraryChange> {
    let Event { kind, paths, .. } = event;
    paths
        .into_iter()
        .filter(|path| is_playable(path))
        .filter_map(|path| match kind {
            EventKind::Create(_) => Some(LibraryChange::Added(path)),
            EventKind::Remove(_) => Some(LibraryChange::Removed(path)),
            // yt-dlp renames its .part file into place when it finishes
            EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
                if path.exists() {
                    Some(LibraryChange::Added(path))
                } else {
                    Some(LibraryChange::Removed(path))
                }
            }
            _ => None,
        })
        .collect()
}
