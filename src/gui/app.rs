use eframe::egui;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::broadcast;
use crate::core::{AppConfig, Library, LibraryChange, LibraryWatcher};
use crate::download::{DownloadSettings, Downloader};
use crate::gui::track_list::{show_track_list, TrackListAction};
use crate::player::{PlaybackController, PlayerCommand};

pub const DEFAULT_TITLE: &str = "Music Player";

pub struct MusicPlayerApp {
    pub config: AppConfig,
    pub player: PlaybackController,
    pub library: Library,
    pub current_track: Option<usize>,
    pub selected_track: Option<usize>,
    pub url_input: String,
    pub downloader: Option<Downloader>,
    pub library_watcher: Option<LibraryWatcher>,
    pub library_receiver: Option<broadcast::Receiver<LibraryChange>>,
    pub status_message: String,
    pub last_status_poll: Instant,
    pub window_title: String,
    pub shown_title: String,
}

impl MusicPlayerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        initial_directory: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let command = match PlayerCommand::locate(config.player_path.as_deref()) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("{}; playback will fail until player_path is configured", e);
                PlayerCommand::ffplay("ffplay")
            }
        };
        log::info!("Using player {}", command.program.display());
        let player = PlaybackController::new(command, config.playback);

        let downloader = match config.resolve_downloader() {
            Ok(program) => {
                let settings = DownloadSettings {
                    program,
                    ffmpeg_location: config.resolve_ffmpeg_location(),
                };
                match Downloader::new(settings) {
                    Ok(downloader) => Some(downloader),
                    Err(e) => {
                        log::error!("Failed to start downloader: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!("Downloads disabled: {}", e);
                None
            }
        };

        let mut app = Self {
            config,
            player,
            library: Library::default(),
            current_track: None,
            selected_track: None,
            url_input: String::new(),
            downloader,
            library_watcher: None,
            library_receiver: None,
            status_message: String::new(),
            last_status_poll: Instant::now(),
            window_title: DEFAULT_TITLE.to_string(),
            shown_title: String::new(),
        };

        if let Some(dir) = initial_directory.or_else(|| app.config.music_directory.clone()) {
            app.open_directory(dir);
        }

        Ok(app)
    }

    /// Switch to `dir`, remember it, and start watching it.
    pub fn open_directory(&mut self, dir: PathBuf) {
        log::info!("Opening music directory {}", dir.display());

        if self.config.music_directory.as_ref() != Some(&dir) {
            self.config.music_directory = Some(dir.clone());
            if let Err(e) = self.config.save() {
                log::error!("Failed to save config: {}", e);
            }
        }

        match LibraryWatcher::new(&dir) {
            Ok((watcher, receiver)) => {
                self.library_watcher = Some(watcher);
                self.library_receiver = Some(receiver);
            }
            Err(e) => {
                log::error!("Failed to watch {}: {}", dir.display(), e);
                self.library_watcher = None;
                self.library_receiver = None;
            }
        }

        self.scan_library();
    }

    /// Rescan the music directory, keeping the playing track highlighted.
    pub fn scan_library(&mut self) {
        let Some(dir) = self.config.music_directory.clone() else {
            self.library = Library::default();
            return;
        };

        match Library::scan(&dir) {
            Ok(library) => {
                self.library = library;
                self.status_message = format!("Loaded {} tracks", self.library.len());
            }
            Err(e) => {
                log::error!("Error scanning directory: {}", e);
                self.library = Library::default();
                self.status_message = format!("Error scanning directory: {}", e);
            }
        }

        self.current_track = self
            .player
            .current_file()
            .and_then(|file| self.library.position_of(&file));
        self.selected_track = self.current_track;
    }

    pub fn play_track(&mut self, index: usize) {
        let Some(track) = self.library.get(index).cloned() else {
            return;
        };

        self.current_track = Some(index);
        self.selected_track = Some(index);

        match self.player.play(&track.path) {
            Ok(()) => {
                self.status_message = format!("Playing: {}", track.file_name());
            }
            Err(e) => {
                log::error!("Failed to play {}: {}", track.path.display(), e);
                self.status_message = format!("Failed to play file! {}", e);
            }
        }
        self.refresh_title();
    }

    /// Play button: selection first, then resume, then replay, then the first track.
    pub fn play_current_or_selected(&mut self) {
        if let Some(index) = self.selected_track.filter(|&i| Some(i) != self.current_track) {
            self.play_track(index);
        } else if self.current_track.is_some() && self.player.is_paused() {
            self.player.resume();
            self.refresh_title();
        } else if self.current_track.is_some() && self.player.is_playing() {
            // Already playing what is selected.
        } else if let Some(index) = self.current_track.or(self.selected_track) {
            self.play_track(index);
        } else if !self.library.is_empty() {
            self.play_track(0);
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.player.is_playing() {
            self.player.pause();
        } else if self.player.is_paused() {
            self.player.resume();
        }
        self.refresh_title();
    }

    pub fn stop_playback(&mut self) {
        if let Err(e) = self.player.stop() {
            log::error!("Failed to stop playback: {}", e);
            self.status_message = format!("Failed to stop playback: {}", e);
        }
        self.current_track = None;
        self.refresh_title();
    }

    pub fn next_track(&mut self) {
        if let Some(index) = self.library.next_index(self.current_track) {
            self.play_track(index);
        }
    }

    pub fn previous_track(&mut self) {
        if let Some(index) = self.library.previous_index(self.current_track) {
            self.play_track(index);
        }
    }

    pub fn start_download(&mut self) {
        let Some(dir) = self.config.music_directory.clone() else {
            self.status_message = "Choose a folder before downloading".to_string();
            return;
        };
        let Some(ref downloader) = self.downloader else {
            self.status_message = "Downloads are unavailable: yt-dlp not found".to_string();
            return;
        };

        match downloader.request(&self.url_input, &dir) {
            Ok(job_id) => {
                log::debug!("Started download job {}", job_id);
                self.status_message = "Downloading…".to_string();
                self.url_input.clear();
            }
            Err(e) => {
                self.status_message = e.to_string();
            }
        }
    }

    pub fn process_download_results(&mut self) {
        let Some(ref downloader) = self.downloader else {
            return;
        };

        let outcomes = downloader.poll_completed();
        if outcomes.is_empty() {
            return;
        }

        for outcome in &outcomes {
            log::info!("Download {} of {} finished", outcome.job_id, outcome.url);
            self.status_message = match &outcome.result {
                Ok(()) => "Download completed successfully!".to_string(),
                Err(e) => e.clone(),
            };
        }
        if outcomes.iter().any(|o| o.result.is_ok()) {
            let message = std::mem::take(&mut self.status_message);
            self.scan_library();
            self.status_message = message;
        }
    }

    pub fn process_library_changes(&mut self) {
        let mut changed = false;
        if let Some(ref mut receiver) = self.library_receiver {
            loop {
                match receiver.try_recv() {
                    Ok(LibraryChange::Added(path)) => {
                        log::debug!("Track added: {}", path.display());
                        changed = true;
                    }
                    Ok(LibraryChange::Removed(path)) => {
                        log::debug!("Track removed: {}", path.display());
                        changed = true;
                    }
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        log::debug!("Skipped {} library events", skipped);
                        changed = true;
                    }
                    Err(_) => break,
                }
            }
        }

        if changed {
            let message = std::mem::take(&mut self.status_message);
            self.scan_library();
            self.status_message = message;
        }
    }

    /// Runs the status check once per configured poll interval.
    pub fn poll_playback(&mut self, now: Instant) {
        if now.duration_since(self.last_status_poll) < self.config.status_poll_interval() {
            return;
        }
        self.last_status_poll = now;
        self.check_playback();
    }

    /// Advance when the current track ended on its own.
    pub fn check_playback(&mut self) {
        if self.player.is_finished() {
            log::info!("Track finished, advancing");
            self.next_track();
        }
        self.refresh_title();
    }

    pub fn title_text(&self) -> String {
        let Some(name) = self.player.current_file().and_then(|f| {
            f.file_name().map(|n| n.to_string_lossy().into_owned())
        }) else {
            return DEFAULT_TITLE.to_string();
        };

        if self.player.is_paused() {
            format!("Paused: {}", name)
        } else if self.player.is_playing() {
            format!("Playing: {}", name)
        } else {
            DEFAULT_TITLE.to_string()
        }
    }

    fn refresh_title(&mut self) {
        self.window_title = self.title_text();
    }

    fn choose_folder(&mut self) {
        let mut dialog = rfd::FileDialog::new().set_title("Select a folder to scan");
        if let Some(ref dir) = self.config.music_directory {
            dialog = dialog.set_directory(dir);
        }
        if let Some(dir) = dialog.pick_folder() {
            self.open_directory(dir);
        }
    }

    fn show_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("📁 Choose Folder").clicked() {
                self.choose_folder();
            }
            if ui.button("Refresh").clicked() {
                self.scan_library();
            }
            if let Some(ref dir) = self.config.music_directory {
                ui.label(format!("📁 {}", dir.display()));
            }
        });

        ui.horizontal(|ui| {
            ui.label("YouTube URL:");
            let downloading = self.downloader.as_ref().is_some_and(|d| d.in_flight() > 0);
            let width = ui.available_width() - 110.0;
            let input = ui.add(egui::TextEdit::singleline(&mut self.url_input).desired_width(width));
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui.add_enabled(!downloading, egui::Button::new("Download")).clicked();
            if (clicked || submitted) && !downloading {
                self.start_download();
            }
        });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let active = self.player.is_active();
        let play_label = if self.player.is_playing() {
            "▶ Playing"
        } else if self.player.is_paused() {
            "▶ Resume"
        } else {
            "▶ Play"
        };
        let pause_label = if self.player.is_paused() { "Paused" } else { "Pause" };
        let has_tracks = !self.library.is_empty();

        ui.horizontal(|ui| {
            if ui.button(play_label).clicked() {
                self.play_current_or_selected();
            }
            if ui.add_enabled(active, egui::Button::new(pause_label)).clicked() {
                self.toggle_pause();
            }
            if ui.add_enabled(active, egui::Button::new("Stop")).clicked() {
                self.stop_playback();
            }
            if ui.add_enabled(has_tracks, egui::Button::new("Prev")).clicked() {
                self.previous_track();
            }
            if ui.add_enabled(has_tracks, egui::Button::new("Next")).clicked() {
                self.next_track();
            }
        });
    }
}

impl eframe::App for MusicPlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_download_results();
        self.process_library_changes();
        self.poll_playback(Instant::now());

        if self.shown_title != self.window_title {
            self.shown_title = self.window_title.clone();
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.shown_title.clone()));
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.show_top_bar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_controls(ui);
            ui.separator();
            ui.horizontal(|ui| {
                ui.label("Status:");
                if self.status_message.is_empty() {
                    ui.label("Ready");
                } else {
                    ui.label(&self.status_message);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            match show_track_list(ui, &self.library, self.selected_track, self.current_track) {
                Some(TrackListAction::Select(index)) => self.selected_track = Some(index),
                Some(TrackListAction::Play(index)) => self.play_track(index),
                None => {}
            }
        });

        ctx.request_repaint_after(self.config.status_poll_interval());
    }
}
