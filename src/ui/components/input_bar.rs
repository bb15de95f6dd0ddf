use std::path::PathBuf;

use eframe::egui;

use super::UiAction;

/// Text entry plus an image path field. Blank input is never submitted.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, image_path: &mut String) -> Option<UiAction> {
    let mut action = None;

    ui.horizontal(|ui| {
        let response = ui.add(
            egui::TextEdit::singleline(input_text)
                .hint_text("Message")
                .desired_width(ui.available_width() - 60.0),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if (ui.button("Send").clicked() || submitted) && !input_text.trim().is_empty() {
            action = Some(UiAction::SendText(std::mem::take(input_text)));
        }
    });

    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(image_path)
                .hint_text("Path to image")
                .desired_width(ui.available_width() - 90.0),
        );
        if ui.button("Send image").clicked() && !image_path.trim().is_empty() {
            let path = PathBuf::from(image_path.trim());
            image_path.clear();
            action = Some(UiAction::SendImage(path));
        }
    });

    action
}
