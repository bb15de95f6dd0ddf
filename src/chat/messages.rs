use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use super::notifications::NotificationDispatcher;
use super::subscription::ChannelSubscription;
use crate::common::types::now_millis;
use crate::common::{GatewayError, Message};
use crate::gateway::{MediaStorage, MessageStore, SessionProvider, validate_channel_id};

/// Send, upload and listen for one client. Writes go to the store; the
/// store's listener is the only source of what a screen displays.
#[derive(Clone)]
pub struct MessagePipeline {
    store: Arc<dyn MessageStore>,
    media: Arc<dyn MediaStorage>,
    session: Arc<dyn SessionProvider>,
    notifier: NotificationDispatcher,
}

/// A stored message plus the background push fan-out it triggered.
pub struct SentMessage {
    pub message: Message,
    pub dispatch: JoinHandle<()>,
}

impl SentMessage {
    /// Waits for the push fan-out. Push failures are logged inside the task.
    pub async fn delivered(self) -> Message {
        if let Err(err) = self.dispatch.await {
            log::warn!("Push dispatch for {} did not finish: {err}", self.message.id);
        }
        self.message
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        media: Arc<dyn MediaStorage>,
        session: Arc<dyn SessionProvider>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            media,
            session,
            notifier,
        }
    }

    /// Persists a message under `channel_id` and, once the write succeeded,
    /// fans out a push to the channel topic. No retry on failure. A message
    /// is either text or an image, never both.
    pub async fn send(
        &self,
        channel_id: &str,
        text: Option<String>,
        image_url: Option<String>,
    ) -> Result<SentMessage, GatewayError> {
        validate_channel_id(channel_id)?;
        let text = non_blank(text);
        let image_url = non_blank(image_url);
        match (&text, &image_url) {
            (None, None) => return Err(GatewayError::EmptyMessage),
            (Some(_), Some(_)) => return Err(GatewayError::TextAndImage),
            _ => {}
        }
        let sender = self.session.current_user().ok_or(GatewayError::Unauthenticated)?;

        let message = Message {
            id: self
                .store
                .allocate_id()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            sender_id: sender.id,
            sender_name: sender.display_name,
            message: text,
            image_url,
            create_at: now_millis(),
        };

        self.store.append(channel_id, &message).await?;
        log::debug!("Message {} stored in {channel_id}", message.id);

        let dispatch = self
            .notifier
            .notify_channel(channel_id, &message.sender_name, &message.preview());
        Ok(SentMessage { message, dispatch })
    }

    /// Upload then send. Not transactional: a failed send leaves the upload
    /// in storage.
    pub async fn send_image(
        &self,
        channel_id: &str,
        local_path: &Path,
    ) -> Result<SentMessage, GatewayError> {
        validate_channel_id(channel_id)?;
        let url = self.media.upload(local_path).await?;
        self.send(channel_id, None, Some(url.clone()))
            .await
            .inspect_err(|err| log::warn!("Image {url} uploaded but not sent: {err}"))
    }

    /// Starts a live view of the channel and registers for its topic.
    pub async fn subscribe(&self, channel_id: &str) -> Result<ChannelSubscription, GatewayError> {
        let feed = self.store.watch(channel_id).await?;
        self.notifier.subscribe_channel(channel_id);
        log::info!("Subscribed to channel {channel_id}");
        Ok(ChannelSubscription::spawn(channel_id, feed))
    }
}
