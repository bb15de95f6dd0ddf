use crate::common::{Channel, Message, Notification, UserProfile};

use super::routes::Route;

/// Form buffers for the login and sign-up screens.
#[derive(Default)]
pub struct AuthForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub error: Option<String>,
    pub pending: bool,
}

impl AuthForm {
    /// Client-side checks before a sign-up is attempted.
    pub fn signup_error(&self) -> Option<&'static str> {
        if [&self.username, &self.email, &self.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            Some("All fields are required")
        } else if self.password != self.confirm_password {
            Some("Passwords do not match")
        } else {
            None
        }
    }

    pub fn login_error(&self) -> Option<&'static str> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            Some("Email and password are required")
        } else {
            None
        }
    }

    fn clear_secrets(&mut self) {
        self.password.clear();
        self.confirm_password.clear();
        self.pending = false;
    }
}

/// Local UI state; mutated only from events and user input.
pub struct AppState {
    pub route: Route,
    pub user: Option<UserProfile>,
    pub auth: AuthForm,
    pub channels: Vec<Channel>,
    pub channels_error: bool,
    pub new_channel_name: String,
    pub messages: Vec<Message>,
    pub input_text: String,
    pub image_path: String,
    pub send_error: Option<String>,
    pub notifications: Vec<Notification>,
}

impl AppState {
    pub fn new(user: Option<UserProfile>) -> Self {
        Self {
            route: Route::start(user.is_some()),
            user,
            auth: AuthForm::default(),
            channels: Vec::new(),
            channels_error: false,
            new_channel_name: String::new(),
            messages: Vec::new(),
            input_text: String::new(),
            image_path: String::new(),
            send_error: None,
            notifications: Vec::new(),
        }
    }

    pub fn open_channel(&mut self, channel_id: &str) {
        self.route = Route::Chat(channel_id.to_string());
        self.messages.clear();
        self.send_error = None;
    }

    pub fn leave_channel(&mut self) {
        self.route = Route::Home;
        self.messages.clear();
        self.input_text.clear();
        self.image_path.clear();
    }

    pub fn signed_in(&mut self, user: UserProfile) {
        self.user = Some(user);
        self.auth.clear_secrets();
        self.auth.error = None;
        self.route = Route::Home;
    }

    pub fn auth_failed(&mut self) {
        self.auth.clear_secrets();
        self.auth.error = Some("Authentication failed".to_string());
    }

    pub fn signed_out(&mut self) {
        *self = AppState::new(None);
    }

    /// Snapshots for channels other than the visible one are stale.
    pub fn replace_messages(&mut self, channel_id: &str, messages: Vec<Message>) {
        if self.route == Route::Chat(channel_id.to_string()) {
            self.messages = messages;
        }
    }

    pub fn current_channel(&self) -> Option<&str> {
        match &self.route {
            Route::Chat(channel_id) => Some(channel_id),
            _ => None,
        }
    }

    pub fn push_notification(&mut self, notification: Notification) {
        const MAX_VISIBLE: usize = 5;
        self.notifications.push(notification);
        if self.notifications.len() > MAX_VISIBLE {
            self.notifications.remove(0);
        }
    }

    pub fn dismiss_notification(&mut self, id: u32) {
        self.notifications.retain(|notification| notification.id != id);
    }
}
