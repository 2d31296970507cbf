use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::player::PlaybackTimings;

/// yt-dlp build shipped next to the executable by the release bundle.
pub const BUNDLED_DOWNLOADER: &str = "./yt-dlp_linux";
pub const BUNDLED_FFMPEG_DIR: &str = "./ffmpeg-master-latest-linux64-gpl/bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub music_directory: Option<PathBuf>,
    pub player_path: Option<PathBuf>,
    pub downloader_path: Option<PathBuf>,
    pub ffmpeg_location: Option<PathBuf>,
    pub playback: PlaybackTimings,
    pub status_poll_ms: u64, // UI refresh / auto-advance check
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            music_directory: None,
            player_path: None,
            downloader_path: None,
            ffmpeg_location: None,
            playback: PlaybackTimings::default(),
            status_poll_ms: 1000,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded existing config from {}", config_path.display());
                    Ok(config)
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), creating new one with defaults", e);
                    let new_config = Self::default();
                    new_config.save_to(config_path)
                        .map_err(|save_err| anyhow::anyhow!("Failed to save new config: {}", save_err))?;
                    Ok(new_config)
                }
            }
        } else {
            log::info!("No config file found, creating default config");
            let config = Self::default();
            config.save_to(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to save default config: {}", e))?;
            log::info!("Created new config file at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("music-player")
            .join("config.json")
    }

    pub fn status_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.status_poll_ms.max(100))
    }

    /// Configured yt-dlp, else the bundled build, else `yt-dlp` on PATH.
    pub fn resolve_downloader(&self) -> anyhow::Result<PathBuf> {
        if let Some(ref path) = self.downloader_path {
            return Ok(path.clone());
        }

        let bundled = PathBuf::from(BUNDLED_DOWNLOADER);
        if bundled.exists() {
            return Ok(bundled);
        }

        which::which("yt-dlp")
            .map_err(|e| anyhow::anyhow!("yt-dlp not found (configure downloader_path): {}", e))
    }

    /// Configured ffmpeg directory, else the bundled one when present.
    pub fn resolve_ffmpeg_location(&self) -> Option<PathBuf> {
        self.ffmpeg_location.clone().or_else(|| {
            let bundled = PathBuf::from(BUNDLED_FFMPEG_DIR);
            bundled.exists().then_some(bundled)
        })
    }
}
