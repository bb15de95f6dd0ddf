use eframe::egui;

use crate::common::Channel;

use super::UiAction;

pub fn render(
    ui: &mut egui::Ui,
    channels: &[Channel],
    failed: bool,
    new_channel_name: &mut String,
) -> Option<UiAction> {
    let mut action = None;

    ui.horizontal(|ui| {
        ui.heading("Channels");
        if ui.small_button("Refresh").clicked() {
            action = Some(UiAction::RefreshChannels);
        }
    });
    ui.separator();

    if failed {
        ui.colored_label(egui::Color32::RED, "Could not load channels");
    } else if channels.is_empty() {
        ui.label("No channels yet");
    }

    egui::ScrollArea::vertical()
        .max_height(ui.available_height() - 40.0)
        .show(ui, |ui| {
            for channel in channels {
                let label = if channel.name.is_empty() { &channel.id } else { &channel.name };
                if ui.button(label).clicked() {
                    action = Some(UiAction::OpenChannel(channel.id.clone()));
                }
            }
        });

    ui.separator();
    ui.horizontal(|ui| {
        ui.add(egui::TextEdit::singleline(new_channel_name).hint_text("New channel name"));
        if ui.button("Create").clicked() && !new_channel_name.trim().is_empty() {
            action = Some(UiAction::CreateChannel(
                std::mem::take(new_channel_name).trim().to_string(),
            ));
        }
    });

    action
}
