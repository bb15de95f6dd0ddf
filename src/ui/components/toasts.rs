use eframe::egui;

use crate::common::Notification;

use super::UiAction;

/// Stack of shown notifications in the top-right corner.
pub fn render(ctx: &egui::Context, notifications: &[Notification]) -> Option<UiAction> {
    if notifications.is_empty() {
        return None;
    }

    let mut action = None;
    egui::Area::new(egui::Id::new("notification_toasts"))
        .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 12.0))
        .show(ctx, |ui| {
            for notification in notifications.iter().rev() {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(260.0);
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(&notification.title).strong());
                        if ui.small_button("x").clicked() {
                            action = Some(UiAction::Dismiss(notification.id));
                        }
                    });
                    ui.label(&notification.body);
                });
                ui.add_space(6.0);
            }
        });
    action
}
