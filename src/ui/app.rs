use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, UserProfile};

use super::components::{UiAction, auth, channel_list, chat_area, input_bar, toasts};
use super::routes::Route;
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        user: Option<UserProfile>,
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        let app = Self {
            state: AppState::new(user),
            command_sender,
            event_receiver,
        };
        if app.state.route == Route::Home {
            app.send_command(ChatCommand::LoadChannels);
        }
        app
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                ChatEvent::SignedIn(user) => {
                    log::info!("Signed in as {}", user.display_name);
                    self.state.signed_in(user);
                    self.send_command(ChatCommand::LoadChannels);
                }
                ChatEvent::AuthFailed => self.state.auth_failed(),
                ChatEvent::SignedOut => self.state.signed_out(),
                ChatEvent::ChannelsLoaded(channels) => {
                    self.state.channels = channels;
                    self.state.channels_error = false;
                }
                ChatEvent::ChannelsFailed => self.state.channels_error = true,
                ChatEvent::MessagesUpdated {
                    channel_id,
                    messages,
                } => self.state.replace_messages(&channel_id, messages),
                ChatEvent::SendFailed { channel_id } => {
                    if self.state.current_channel() == Some(channel_id.as_str()) {
                        self.state.send_error = Some("Message could not be sent".to_string());
                    }
                }
                ChatEvent::UploadFailed { channel_id } => {
                    if self.state.current_channel() == Some(channel_id.as_str()) {
                        self.state.send_error = Some("Image could not be sent".to_string());
                    }
                }
                ChatEvent::NotificationShown(notification) => {
                    self.state.push_notification(notification)
                }
            }
        }
    }

    fn send_command(&self, command: ChatCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to chat client: {err}");
        }
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::SignIn => {
                self.state.auth.pending = true;
                self.send_command(ChatCommand::SignIn {
                    email: self.state.auth.email.trim().to_string(),
                    password: self.state.auth.password.clone(),
                });
            }
            UiAction::SignUp => {
                self.state.auth.pending = true;
                self.send_command(ChatCommand::SignUp {
                    username: self.state.auth.username.trim().to_string(),
                    email: self.state.auth.email.trim().to_string(),
                    password: self.state.auth.password.clone(),
                });
            }
            UiAction::ShowSignup => {
                self.state.auth.error = None;
                self.state.route = Route::Signup;
            }
            UiAction::ShowLogin => {
                self.state.auth.error = None;
                self.state.route = Route::Login;
            }
            UiAction::SignOut => self.send_command(ChatCommand::SignOut),
            UiAction::RefreshChannels => self.send_command(ChatCommand::LoadChannels),
            UiAction::CreateChannel(name) => {
                self.send_command(ChatCommand::CreateChannel { name })
            }
            UiAction::OpenChannel(channel_id) => {
                self.state.open_channel(&channel_id);
                self.send_command(ChatCommand::OpenChannel { channel_id });
            }
            UiAction::LeaveChannel => {
                self.state.leave_channel();
                self.send_command(ChatCommand::CloseChannel);
            }
            UiAction::SendText(text) => {
                if let Some(channel_id) = self.state.current_channel().map(str::to_string) {
                    self.state.send_error = None;
                    self.send_command(ChatCommand::SendMessage { channel_id, text });
                }
            }
            UiAction::SendImage(path) => {
                if let Some(channel_id) = self.state.current_channel().map(str::to_string) {
                    self.state.send_error = None;
                    self.send_command(ChatCommand::SendImage { channel_id, path });
                }
            }
            UiAction::Dismiss(id) => self.state.dismiss_notification(id),
        }
    }

    fn top_bar(&mut self, ctx: &egui::Context) -> Option<UiAction> {
        let mut action = None;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Route::Chat(channel_id) = &self.state.route {
                    if ui.button("< Back").clicked() {
                        action = Some(UiAction::LeaveChannel);
                    }
                    ui.heading(format!("# {channel_id}"));
                } else {
                    ui.heading("Channel Chat");
                }
                if let Some(user) = &self.state.user {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Sign out").clicked() {
                            action = Some(UiAction::SignOut);
                        }
                        ui.label(&user.display_name);
                    });
                }
            });
        });
        action
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        let mut actions: Vec<UiAction> = Vec::new();
        if self.state.user.is_some() {
            actions.extend(self.top_bar(ctx));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let state = &mut self.state;
            let action = match state.route.clone() {
                Route::Login => auth::login(ui, &mut state.auth),
                Route::Signup => auth::signup(ui, &mut state.auth),
                Route::Home => channel_list::render(
                    ui,
                    &state.channels,
                    state.channels_error,
                    &mut state.new_channel_name,
                ),
                Route::Chat(_) => {
                    let own_id = state.user.as_ref().map(|user| user.id.as_str());
                    chat_area::render(ui, &state.messages, own_id);
                    if let Some(error) = &state.send_error {
                        ui.colored_label(egui::Color32::RED, error);
                    }
                    ui.separator();
                    input_bar::render(ui, &mut state.input_text, &mut state.image_path)
                }
            };
            actions.extend(action);
        });

        actions.extend(toasts::render(ctx, &self.state.notifications));

        for action in actions {
            self.apply(action);
        }

        ctx.request_repaint();
    }
}
