use super::types::{Channel, Message, Notification, UserProfile};

/// Events the client loop publishes up to the UI.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    SignedIn(UserProfile),
    /// Undifferentiated on purpose; the UI shows a generic failure.
    AuthFailed,
    SignedOut,
    ChannelsLoaded(Vec<Channel>),
    ChannelsFailed,
    /// Whole-list replacement for the open channel.
    MessagesUpdated {
        channel_id: String,
        messages: Vec<Message>,
    },
    SendFailed {
        channel_id: String,
    },
    UploadFailed {
        channel_id: String,
    },
    NotificationShown(Notification),
}
