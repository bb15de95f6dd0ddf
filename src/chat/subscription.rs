use futures::StreamExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::{GatewayError, Message};
use crate::gateway::MessageFeed;

#[derive(Debug)]
pub enum SubscriptionUpdate {
    Messages(Vec<Message>),
    /// Terminal; reported once, never retried.
    Failed(GatewayError),
}

/// Live, wholesale-replaced view of one channel. The owner cancels it when
/// the screen goes away; dropping it cancels too.
pub struct ChannelSubscription {
    channel_id: String,
    updates: watch::Receiver<Vec<Message>>,
    errors: oneshot::Receiver<GatewayError>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl ChannelSubscription {
    /// Drives `feed` on a background task until it ends, fails or is
    /// cancelled.
    pub(crate) fn spawn(channel_id: &str, mut feed: MessageFeed) -> Self {
        let (update_tx, updates) = watch::channel(Vec::new());
        let (error_tx, errors) = oneshot::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let channel = channel_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = feed.next() => next,
                };
                match next {
                    Some(Ok(messages)) => {
                        if update_tx.send(messages).is_err() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        log::warn!("Subscription to {channel} failed: {err}");
                        let _ = error_tx.send(err);
                        break;
                    }
                    None => break,
                }
            }
            log::debug!("Listener on {channel} detached");
        });

        Self {
            channel_id: channel_id.to_string(),
            updates,
            errors,
            cancel,
            task: Some(task),
            finished: false,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Another observer of the same snapshots.
    pub fn watcher(&self) -> watch::Receiver<Vec<Message>> {
        self.updates.clone()
    }

    /// Waits for the next snapshot or the terminal error. `None` once the
    /// subscription has ended.
    pub async fn next(&mut self) -> Option<SubscriptionUpdate> {
        if self.finished {
            return None;
        }
        match self.updates.changed().await {
            Ok(()) => Some(SubscriptionUpdate::Messages(
                self.updates.borrow_and_update().clone(),
            )),
            Err(_) => {
                // The forwarding task is gone; it reports its error first.
                self.finished = true;
                self.errors.try_recv().ok().map(SubscriptionUpdate::Failed)
            }
        }
    }

    /// Detaches the backend listener and waits until no further update can
    /// be published.
    pub async fn cancel(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::warn!("Listener task for {} ended abnormally: {err}", self.channel_id);
            }
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn message(id: &str, create_at: i64) -> Message {
        Message {
            id: id.into(),
            sender_id: "u".into(),
            sender_name: "n".into(),
            message: Some(id.into()),
            image_url: None,
            create_at,
        }
    }

    #[tokio::test]
    async fn forwards_snapshots_then_reports_error_once() {
        let feed = stream::iter(vec![
            Ok(vec![message("a", 1)]),
            Err(GatewayError::SubscriptionEnded("cancelled".into())),
        ])
        .boxed();
        let mut subscription = ChannelSubscription::spawn("general", feed);

        let mut saw_failure = false;
        while let Some(update) = subscription.next().await {
            match update {
                SubscriptionUpdate::Messages(messages) => {
                    assert!(messages.is_empty() || messages == vec![message("a", 1)]);
                }
                SubscriptionUpdate::Failed(err) => {
                    assert!(!saw_failure);
                    assert!(matches!(err, GatewayError::SubscriptionEnded(_)));
                    saw_failure = true;
                }
            }
        }
        assert!(saw_failure);
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_stops_a_pending_feed() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Vec<Message>, GatewayError>>();
        let subscription = ChannelSubscription::spawn("general", rx.boxed());
        let mut watcher = subscription.watcher();

        subscription.cancel().await;
        // The receiving end is gone with the task.
        assert!(tx.unbounded_send(Ok(vec![message("late", 1)])).is_err());
        assert!(watcher.changed().await.is_err());
    }
}
