use eframe::egui;
use crate::core::Library;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackListAction {
    Select(usize),
    Play(usize),
}

/// Draws the scanned tracks. Single click selects, double click plays.
pub fn show_track_list(
    ui: &mut egui::Ui,
    library: &Library,
    selected: Option<usize>,
    current: Option<usize>,
) -> Option<TrackListAction> {
    let mut action = None;

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            if library.root.is_none() {
                ui.label("Select a folder…");
                return;
            }
            if library.is_empty() {
                ui.label("(No MP3 files found)");
                return;
            }

            for (index, track) in library.tracks.iter().enumerate() {
                let text = if current == Some(index) {
                    egui::RichText::new(format!("▶ {}", track.display_name)).strong()
                } else {
                    egui::RichText::new(&track.display_name)
                };

                let response = ui.selectable_label(selected == Some(index), text);
                if response.double_clicked() {
                    action = Some(TrackListAction::Play(index));
                } else if response.clicked() {
                    action = Some(TrackListAction::Select(index));
                }
            }
        });

    action
}
