use chrono::{DateTime, Local};
use eframe::egui;

use crate::common::Message;

pub const EMPTY_PLACEHOLDER: &str = "(empty message)";

fn timestamp(create_at: i64) -> String {
    DateTime::from_timestamp_millis(create_at)
        .map(|time| time.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Message list, oldest first, pinned to the newest entry.
pub fn render(ui: &mut egui::Ui, messages: &[Message], own_id: Option<&str>) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .max_height(ui.available_height() - 70.0)
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if messages.is_empty() {
                ui.label(egui::RichText::new("No messages yet").weak());
            }
            for message in messages {
                ui.horizontal_wrapped(|ui| {
                    let name = egui::RichText::new(&message.sender_name).strong();
                    if own_id == Some(message.sender_id.as_str()) {
                        ui.label(name.color(egui::Color32::LIGHT_BLUE));
                    } else {
                        ui.label(name);
                    }
                    ui.label(egui::RichText::new(timestamp(message.create_at)).weak());

                    if let Some(text) = message.text() {
                        ui.label(text);
                    }
                    if let Some(url) = message.image() {
                        ui.hyperlink_to("[image]", url);
                    }
                    if message.is_empty() {
                        ui.label(egui::RichText::new(EMPTY_PLACEHOLDER).italics().weak());
                    }
                });
            }
        });
}
