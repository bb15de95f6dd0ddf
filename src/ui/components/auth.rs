use eframe::egui;

use crate::ui::state::AuthForm;

use super::UiAction;

fn password_field(ui: &mut egui::Ui, value: &mut String, hint: &str) {
    ui.add(egui::TextEdit::singleline(value).password(true).hint_text(hint));
}

fn show_error(ui: &mut egui::Ui, form: &AuthForm) {
    if let Some(error) = &form.error {
        ui.colored_label(egui::Color32::RED, error);
    }
}

pub fn login(ui: &mut egui::Ui, form: &mut AuthForm) -> Option<UiAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.heading("Sign in");
        ui.add_space(12.0);
        ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("Email"));
        password_field(ui, &mut form.password, "Password");
        show_error(ui, form);
        ui.add_space(8.0);

        if ui.add_enabled(!form.pending, egui::Button::new("Sign in")).clicked() {
            match form.login_error() {
                Some(error) => form.error = Some(error.to_string()),
                None => action = Some(UiAction::SignIn),
            }
        }
        if ui.link("No account yet? Sign up").clicked() {
            action = Some(UiAction::ShowSignup);
        }
    });

    action
}

pub fn signup(ui: &mut egui::Ui, form: &mut AuthForm) -> Option<UiAction> {
    let mut action = None;

    ui.vertical_centered(|ui| {
        ui.heading("Create account");
        ui.add_space(12.0);
        ui.add(egui::TextEdit::singleline(&mut form.username).hint_text("Display name"));
        ui.add(egui::TextEdit::singleline(&mut form.email).hint_text("Email"));
        password_field(ui, &mut form.password, "Password");
        password_field(ui, &mut form.confirm_password, "Confirm password");
        show_error(ui, form);
        ui.add_space(8.0);

        if ui.add_enabled(!form.pending, egui::Button::new("Sign up")).clicked() {
            match form.signup_error() {
                Some(error) => form.error = Some(error.to_string()),
                None => action = Some(UiAction::SignUp),
            }
        }
        if ui.link("Already registered? Sign in").clicked() {
            action = Some(UiAction::ShowLogin);
        }
    });

    action
}
