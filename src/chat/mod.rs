//! The message pipeline: sending, listening and push fan-out on top of the
//! gateway traits.

pub mod channels;
pub mod messages;
pub mod notifications;
pub mod subscription;

pub use channels::ChannelService;
pub use messages::MessagePipeline;
pub use notifications::{LogSink, NotificationDispatcher, NotificationSink};
pub use subscription::{ChannelSubscription, SubscriptionUpdate};
