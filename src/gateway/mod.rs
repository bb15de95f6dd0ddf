//! Capability seams over the managed backend. Each trait wraps exactly one
//! external service; the Firebase and local backends implement all of them.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use futures::stream::BoxStream;
use regex::Regex;
use uuid::Uuid;

use crate::common::{AuthError, Channel, DispatchError, GatewayError, Message, PushNotification, UserProfile};

/// Successive full snapshots of a channel, ascending by `create_at`.
/// An `Err` item is terminal.
pub type MessageFeed = BoxStream<'static, Result<Vec<Message>, GatewayError>>;

/// Pushes delivered to this device.
pub type PushFeed = BoxStream<'static, PushNotification>;

pub const IMAGE_PREFIX: &str = "images/";

#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<UserProfile>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError>;

    /// `username` becomes the display name of the new account.
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError>;

    fn sign_out(&self);
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Backend-issued message key, if the backend hands them out client-side.
    fn allocate_id(&self) -> Option<String> {
        None
    }

    async fn append(&self, channel_id: &str, message: &Message) -> Result<(), GatewayError>;

    /// Opens a live listener. Dropping the feed detaches it.
    async fn watch(&self, channel_id: &str) -> Result<MessageFeed, GatewayError>;
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Uploads under a fresh `images/{uuid}` key and returns a retrieval URL.
    async fn upload(&self, local_path: &Path) -> Result<String, GatewayError>;
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Channel>, GatewayError>;

    async fn create(&self, name: &str) -> Result<Channel, GatewayError>;
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_to_topic(&self, notification: &PushNotification) -> Result<(), DispatchError>;

    async fn subscribe_topic(&self, topic: &str) -> Result<(), DispatchError>;

    /// Inbound pushes for this device; `None` when the transport cannot
    /// receive on this platform.
    fn incoming(&self) -> Option<PushFeed>;
}

const MAX_KEY_BYTES: usize = 768;

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.$#\[\]/\x00-\x1F\x7F]+$").expect("static regex"));

/// Channel ids are backend keys: no `. $ # [ ] /` and no control characters.
pub fn validate_channel_id(channel_id: &str) -> Result<(), GatewayError> {
    if channel_id.len() <= MAX_KEY_BYTES && CHANNEL_ID.is_match(channel_id) {
        Ok(())
    } else {
        Err(GatewayError::InvalidChannelId(channel_id.to_string()))
    }
}

pub fn new_image_key() -> String {
    format!("{IMAGE_PREFIX}{}", Uuid::new_v4())
}

/// Best-effort content type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
