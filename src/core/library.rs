use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub display_name: String, // relative to the library root
}

impl Track {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display_name.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    pub root: Option<PathBuf>,
    pub tracks: Vec<Track>,
}

pub fn is_playable(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

impl Library {
    /// Recursively collect every mp3 under `root`, sorted by relative path.
    pub fn scan(root: &Path) -> anyhow::Result<Self> {
        if !root.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", root.display()));
        }

        let mut tracks = Vec::new();
        collect_tracks(root, root, &mut tracks)?;
        tracks.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        log::info!("Found {} tracks in {}", tracks.len(), root.display());
        Ok(Self {
            root: Some(root.to_path_buf()),
            tracks,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|track| track.path == path)
    }

    /// Track after `current`, wrapping to the first.
    pub fn next_index(&self, current: Option<usize>) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        match current {
            Some(index) if index + 1 < self.tracks.len() => Some(index + 1),
            _ => Some(0),
        }
    }

    /// Track before `current`, wrapping to the last.
    pub fn previous_index(&self, current: Option<usize>) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        match current {
            Some(index) if index > 0 && index < self.tracks.len() => Some(index - 1),
            _ => Some(self.tracks.len() - 1),
        }
    }
}

fn collect_tracks(root: &Path, dir: &Path, tracks: &mut Vec<Track>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read directory {}: {}", dir.display(), e))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if let Err(e) = collect_tracks(root, &path, tracks) {
                log::warn!("Skipping {}: {}", path.display(), e);
            }
        } else if path.is_file() && is_playable(&path) {
            let display_name = path
                .strip_prefix(root)
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| path.file_name().unwrap_or_default().to_string_lossy().into_owned());
            tracks.push(Track { path, display_name });
        }
    }

    Ok(())
}
