pub mod commands;
pub mod error;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use error::{AuthError, DispatchError, GatewayError};
pub use events::ChatEvent;
pub use types::{Channel, Message, Notification, PushNotification, UserProfile};
