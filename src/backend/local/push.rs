use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::common::{DispatchError, PushNotification};
use crate::gateway::{PushFeed, PushTransport};

/// Topic fan-out inside one process. The device only receives pushes for
/// topics it subscribed to, mirroring a push registration.
pub struct LocalPushBus {
    sender: broadcast::Sender<PushNotification>,
    topics: Arc<Mutex<HashSet<String>>>,
}

impl LocalPushBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            topics: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for LocalPushBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for LocalPushBus {
    async fn send_to_topic(&self, notification: &PushNotification) -> Result<(), DispatchError> {
        let delivered = self.sender.send(notification.clone()).unwrap_or(0);
        log::debug!(
            "Local push to {} reached {delivered} listener(s)",
            notification.topic
        );
        Ok(())
    }

    async fn subscribe_topic(&self, topic: &str) -> Result<(), DispatchError> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
        Ok(())
    }

    fn incoming(&self) -> Option<PushFeed> {
        let receiver = self.sender.subscribe();
        let topics = Arc::clone(&self.topics);

        let feed = stream::unfold((receiver, topics), |(mut receiver, topics)| async move {
            loop {
                match receiver.recv().await {
                    Ok(push) => {
                        let subscribed = topics
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .contains(&push.topic);
                        if subscribed {
                            return Some((push, (receiver, topics)));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Local push feed lagged, {skipped} push(es) dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Some(feed.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(topic: &str, body: &str) -> PushNotification {
        PushNotification {
            topic: topic.into(),
            title: Some("New message".into()),
            body: Some(body.into()),
        }
    }

    #[tokio::test]
    async fn only_subscribed_topics_are_delivered() {
        let bus = LocalPushBus::new();
        let mut incoming = bus.incoming().unwrap();

        bus.subscribe_topic("group_a").await.unwrap();
        bus.subscribe_topic("group_a").await.unwrap();
        bus.send_to_topic(&push("group_b", "ignored")).await.unwrap();
        bus.send_to_topic(&push("group_a", "hello")).await.unwrap();

        let received = incoming.next().await.unwrap();
        assert_eq!(received, push("group_a", "hello"));
    }

    #[tokio::test]
    async fn sending_without_listeners_is_not_an_error() {
        let bus = LocalPushBus::new();
        assert!(bus.send_to_topic(&push("group_a", "x")).await.is_ok());
    }
}
