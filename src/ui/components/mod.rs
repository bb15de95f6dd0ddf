use std::path::PathBuf;

pub mod auth;
pub mod channel_list;
pub mod chat_area;
pub mod input_bar;
pub mod toasts;

/// What a screen asks the app to do after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    SignIn,
    SignUp,
    ShowSignup,
    ShowLogin,
    SignOut,
    RefreshChannels,
    CreateChannel(String),
    OpenChannel(String),
    LeaveChannel,
    SendText(String),
    SendImage(PathBuf),
    Dismiss(u32),
}
