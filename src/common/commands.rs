use std::path::PathBuf;

/// Intents the UI sends down to the client loop.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        username: String,
        email: String,
        password: String,
    },
    SignOut,
    LoadChannels,
    /// Fire-and-forget; the refreshed list arrives as `ChannelsLoaded`.
    CreateChannel {
        name: String,
    },
    /// Replaces any active subscription with one on `channel_id`.
    OpenChannel {
        channel_id: String,
    },
    /// Chat screen torn down; cancels the active subscription.
    CloseChannel,
    SendMessage {
        channel_id: String,
        text: String,
    },
    SendImage {
        channel_id: String,
        path: PathBuf,
    },
}
