use serde::{Deserialize, Serialize};

/// One chat message, stored flat under its channel partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Milliseconds since epoch; the ordering key of a channel.
    #[serde(default)]
    pub create_at: i64,
}

impl Message {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().filter(|text| !text.is_empty())
    }

    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    /// A record carrying neither text nor an image. Never produced by `send`,
    /// but readable from the backend.
    pub fn is_empty(&self) -> bool {
        self.text().is_none() && self.image().is_none()
    }

    /// Short form used as push notification body content.
    pub fn preview(&self) -> String {
        match (self.text(), self.image()) {
            (Some(text), _) => text.to_string(),
            (None, Some(_)) => IMAGE_PREVIEW.to_string(),
            (None, None) => String::new(),
        }
    }
}

pub const IMAGE_PREVIEW: &str = "[image]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub create_at: i64,
}

/// The signed-in identity as seen by the rest of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
}

/// Outbound/inbound push payload addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub topic: String,
    pub title: Option<String>,
    pub body: Option<String>,
}

/// A push that passed self-suppression and was shown locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub title: String,
    pub body: String,
}

pub fn topic_for(channel_id: &str) -> String {
    format!("group_{channel_id}")
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: Option<&str>, image: Option<&str>) -> Message {
        Message {
            id: "m1".into(),
            sender_id: "u1".into(),
            sender_name: "Alice".into(),
            message: text.map(str::to_string),
            image_url: image.map(str::to_string),
            create_at: 1,
        }
    }

    #[test]
    fn wire_format_uses_camel_case_and_omits_missing_fields() {
        let json = serde_json::to_value(message(Some("hi"), None)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "m1",
                "senderId": "u1",
                "senderName": "Alice",
                "message": "hi",
                "createAt": 1
            })
        );
    }

    #[test]
    fn record_without_text_or_image_is_readable_but_empty() {
        let parsed: Message = serde_json::from_str(
            r#"{"id":"x","senderId":"u","senderName":"n","createAt":5}"#,
        )
        .unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.preview(), "");

        assert!(message(Some(""), Some("")).is_empty());
    }

    #[test]
    fn preview_prefers_text_then_image_marker() {
        assert_eq!(message(Some("hello"), None).preview(), "hello");
        assert_eq!(message(None, Some("https://x/images/1")).preview(), IMAGE_PREVIEW);
    }

    #[test]
    fn topic_naming() {
        assert_eq!(topic_for("general"), "group_general");
    }
}
