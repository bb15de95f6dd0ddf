use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::common::types::topic_for;
use crate::common::{Notification, PushNotification};
use crate::gateway::{PushTransport, SessionProvider};

/// Where rendered notifications go (desktop toast, UI event, test recorder).
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Outbound fan-out to channel topics and inbound rendering with
/// self-suppression. Every network call here is best-effort: failures are
/// logged and never reach the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    push: Arc<dyn PushTransport>,
    session: Arc<dyn SessionProvider>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(
        push: Arc<dyn PushTransport>,
        session: Arc<dyn SessionProvider>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            push,
            session,
            sink,
        }
    }

    /// Fire-and-forget push to every subscriber of the channel topic.
    pub fn notify_channel(
        &self,
        channel_id: &str,
        sender_name: &str,
        preview: &str,
    ) -> JoinHandle<()> {
        let push = Arc::clone(&self.push);
        let notification = PushNotification {
            topic: topic_for(channel_id),
            title: Some(format!("New message in {channel_id}")),
            body: Some(format!("{sender_name}: {preview}")),
        };

        tokio::spawn(async move {
            match push.send_to_topic(&notification).await {
                Ok(()) => log::debug!("Notification sent to {}", notification.topic),
                Err(err) => log::warn!("Failed to send notification to {}: {err}", notification.topic),
            }
        })
    }

    /// Idempotent, best-effort registration for the channel topic.
    pub fn subscribe_channel(&self, channel_id: &str) -> JoinHandle<()> {
        let push = Arc::clone(&self.push);
        let topic = topic_for(channel_id);

        tokio::spawn(async move {
            match push.subscribe_topic(&topic).await {
                Ok(()) => log::debug!("Subscribed to topic {topic}"),
                Err(err) => log::warn!("Failed to subscribe to topic {topic}: {err}"),
            }
        })
    }

    /// Renders an inbound push unless it looks self-authored: the current
    /// display name appearing anywhere in title or body suppresses it. An
    /// empty name is contained in every present title or body.
    /// Returns the rendered notification.
    pub fn on_push_received(&self, title: Option<&str>, body: Option<&str>) -> Option<Notification> {
        let current_name = self.session.current_user().map(|user| user.display_name);

        if let Some(name) = current_name {
            let mentions = |text: Option<&str>| text.is_some_and(|text| text.contains(&name));
            if mentions(title) || mentions(body) {
                log::debug!("Suppressing self-authored notification");
                return None;
            }
        }

        let notification = Notification {
            id: rand::rng().random_range(0..1000),
            title: title.unwrap_or_default().to_string(),
            body: body.unwrap_or_default().to_string(),
        };
        self.sink.show(notification.clone());
        Some(notification)
    }
}

/// Sink that only writes to the log; used by the headless CLI.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn show(&self, notification: Notification) {
        log::info!(
            "[notification #{}] {}: {}",
            notification.id,
            notification.title,
            notification.body
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::common::{AuthError, DispatchError, UserProfile};
    use crate::gateway::PushFeed;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub shown: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn show(&self, notification: Notification) {
            self.shown.lock().unwrap().push(notification);
        }
    }

    struct FixedSession(Option<&'static str>);

    #[async_trait]
    impl SessionProvider for FixedSession {
        fn current_user(&self) -> Option<UserProfile> {
            self.0.map(|name| UserProfile {
                id: "uid".into(),
                display_name: name.into(),
            })
        }

        async fn sign_in(&self, _: &str, _: &str) -> Result<UserProfile, AuthError> {
            Err(AuthError::Failed("fixed".into()))
        }

        async fn sign_up(&self, _: &str, _: &str, _: &str) -> Result<UserProfile, AuthError> {
            Err(AuthError::Failed("fixed".into()))
        }

        fn sign_out(&self) {}
    }

    #[derive(Default)]
    pub(crate) struct RecordingPush {
        pub sent: Mutex<Vec<PushNotification>>,
        pub topics: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl PushTransport for RecordingPush {
        async fn send_to_topic(&self, notification: &PushNotification) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Rejected {
                    status: 500,
                    body: "down".into(),
                });
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        async fn subscribe_topic(&self, topic: &str) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Credentials("none".into()));
            }
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }

        fn incoming(&self) -> Option<PushFeed> {
            None
        }
    }

    fn dispatcher(
        name: Option<&'static str>,
        push: Arc<RecordingPush>,
    ) -> (NotificationDispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(push, Arc::new(FixedSession(name)), sink.clone());
        (dispatcher, sink)
    }

    #[tokio::test]
    async fn own_messages_are_suppressed() {
        let (dispatcher, sink) = dispatcher(Some("Alice"), Arc::default());

        assert!(dispatcher.on_push_received(Some("New message"), Some("Alice: hi")).is_none());
        assert!(dispatcher.on_push_received(Some("Alice in general"), None).is_none());
        assert!(sink.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_senders_are_rendered_with_bounded_ids() {
        let (dispatcher, sink) = dispatcher(Some("Alice"), Arc::default());

        let shown = dispatcher
            .on_push_received(Some("New message"), Some("Bob: hi"))
            .unwrap();
        assert!(shown.id < 1000);
        assert_eq!(shown.body, "Bob: hi");
        assert_eq!(sink.shown.lock().unwrap().as_slice(), [shown]);
    }

    #[tokio::test]
    async fn signed_out_users_see_everything() {
        let (signed_out, sink) = dispatcher(None, Arc::default());
        assert!(signed_out.on_push_received(Some("t"), Some("Alice: hi")).is_some());
        assert_eq!(sink.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_display_name_matches_any_text() {
        let (nameless, sink) = dispatcher(Some(""), Arc::default());

        assert!(nameless.on_push_received(Some("t"), Some("x")).is_none());
        assert!(nameless.on_push_received(Some("New message"), Some("Bob: hi")).is_none());
        assert!(nameless.on_push_received(None, Some("Bob: hi")).is_none());
        assert!(sink.shown.lock().unwrap().is_empty());

        // Nothing to match against when both are absent.
        assert!(nameless.on_push_received(None, None).is_some());
        assert_eq!(sink.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notify_channel_targets_topic_with_preview() {
        let push = Arc::new(RecordingPush::default());
        let (dispatcher, _) = dispatcher(Some("Alice"), push.clone());

        dispatcher.notify_channel("general", "Alice", "hi").await.unwrap();
        dispatcher.subscribe_channel("general").await.unwrap();

        assert_eq!(
            push.sent.lock().unwrap().as_slice(),
            [PushNotification {
                topic: "group_general".into(),
                title: Some("New message in general".into()),
                body: Some("Alice: hi".into()),
            }]
        );
        assert_eq!(push.topics.lock().unwrap().as_slice(), ["group_general"]);
    }

    #[tokio::test]
    async fn dispatch_failures_stay_inside_the_task() {
        let push = Arc::new(RecordingPush {
            fail: true,
            ..Default::default()
        });
        let (dispatcher, _) = dispatcher(Some("Alice"), push);

        assert!(dispatcher.notify_channel("general", "Alice", "hi").await.is_ok());
        assert!(dispatcher.subscribe_channel("general").await.is_ok());
    }
}
