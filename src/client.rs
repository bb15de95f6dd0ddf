use std::future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::chat::{
    ChannelService, ChannelSubscription, MessagePipeline, NotificationDispatcher,
    NotificationSink, SubscriptionUpdate,
};
use crate::common::{ChatCommand, ChatEvent, Notification, PushNotification};
use crate::gateway::PushFeed;

/// Owns the backend on behalf of the UI: turns commands into gateway calls
/// and gateway output into events. At most one channel is listened to.
pub struct ChatClient {
    backend: Backend,
    pipeline: MessagePipeline,
    channels: ChannelService,
    notifier: NotificationDispatcher,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    active: Option<ChannelSubscription>,
}

/// Rendered notifications become UI events.
struct EventSink {
    sender: mpsc::Sender<ChatEvent>,
}

impl NotificationSink for EventSink {
    fn show(&self, notification: Notification) {
        log::info!("Notification: {} / {}", notification.title, notification.body);
        if let Err(err) = self
            .sender
            .try_send(ChatEvent::NotificationShown(notification))
        {
            log::warn!("Failed to forward notification to UI: {err}");
        }
    }
}

impl ChatClient {
    pub fn new(
        backend: Backend,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        let sink = Arc::new(EventSink {
            sender: event_sender.clone(),
        });
        let notifier =
            NotificationDispatcher::new(backend.push.clone(), backend.session.clone(), sink);
        let pipeline = MessagePipeline::new(
            backend.messages.clone(),
            backend.media.clone(),
            backend.session.clone(),
            notifier.clone(),
        );
        let channels = ChannelService::new(backend.channels.clone());

        Self {
            backend,
            pipeline,
            channels,
            notifier,
            event_sender,
            command_receiver,
            active: None,
        }
    }

    /// Runs until the UI drops its command sender.
    pub async fn run(mut self) {
        let mut incoming = self.backend.push.incoming();
        log::info!("Chat client loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command).await;
                    } else {
                        break;
                    }
                }
                update = next_update(&mut self.active) => {
                    self.handle_update(update).await;
                }
                push = next_push(&mut incoming) => {
                    match push {
                        Some(push) => self.handle_push(push),
                        None => incoming = None,
                    }
                }
            }
        }

        self.close_channel().await;
        log::info!("Chat client loop stopped");
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SignIn { email, password } => {
                match self.backend.session.sign_in(&email, &password).await {
                    Ok(profile) => self.emit(ChatEvent::SignedIn(profile)).await,
                    Err(err) => {
                        log::warn!("Sign-in failed: {err}");
                        self.emit(ChatEvent::AuthFailed).await;
                    }
                }
            }
            ChatCommand::SignUp {
                username,
                email,
                password,
            } => match self.backend.session.sign_up(&username, &email, &password).await {
                Ok(profile) => self.emit(ChatEvent::SignedIn(profile)).await,
                Err(err) => {
                    log::warn!("Sign-up failed: {err}");
                    self.emit(ChatEvent::AuthFailed).await;
                }
            },
            ChatCommand::SignOut => {
                self.close_channel().await;
                self.backend.session.sign_out();
                self.emit(ChatEvent::SignedOut).await;
            }
            ChatCommand::LoadChannels => match self.channels.list().await {
                Ok(channels) => self.emit(ChatEvent::ChannelsLoaded(channels)).await,
                Err(err) => {
                    log::warn!("Failed to load channels: {err}");
                    self.emit(ChatEvent::ChannelsFailed).await;
                }
            },
            ChatCommand::CreateChannel { name } => {
                if name.trim().is_empty() {
                    return;
                }
                let channels = self.channels.clone();
                let events = self.event_sender.clone();
                tokio::spawn(async move {
                    if !matches!(channels.create(&name).await, Ok(Some(_))) {
                        return;
                    }
                    match channels.list().await {
                        Ok(list) => {
                            let _ = events.send(ChatEvent::ChannelsLoaded(list)).await;
                        }
                        Err(err) => log::warn!("Failed to refresh channels: {err}"),
                    }
                });
            }
            ChatCommand::OpenChannel { channel_id } => {
                self.close_channel().await;
                match self.pipeline.subscribe(&channel_id).await {
                    Ok(subscription) => self.active = Some(subscription),
                    Err(err) => log::warn!("Failed to listen on {channel_id}: {err}"),
                }
            }
            ChatCommand::CloseChannel => self.close_channel().await,
            ChatCommand::SendMessage { channel_id, text } => {
                let pipeline = self.pipeline.clone();
                let events = self.event_sender.clone();
                tokio::spawn(async move {
                    if let Err(err) = pipeline.send(&channel_id, Some(text), None).await {
                        log::warn!("Failed to send message to {channel_id}: {err}");
                        let _ = events.send(ChatEvent::SendFailed { channel_id }).await;
                    }
                });
            }
            ChatCommand::SendImage { channel_id, path } => {
                let pipeline = self.pipeline.clone();
                let events = self.event_sender.clone();
                tokio::spawn(async move {
                    if let Err(err) = pipeline.send_image(&channel_id, &path).await {
                        log::warn!("Failed to send image {}: {err}", path.display());
                        let _ = events.send(ChatEvent::UploadFailed { channel_id }).await;
                    }
                });
            }
        }
    }

    async fn handle_update(&mut self, update: Option<SubscriptionUpdate>) {
        let Some(channel_id) = self.active.as_ref().map(|s| s.channel_id().to_string()) else {
            return;
        };
        match update {
            Some(SubscriptionUpdate::Messages(messages)) => {
                self.emit(ChatEvent::MessagesUpdated {
                    channel_id,
                    messages,
                })
                .await;
            }
            Some(SubscriptionUpdate::Failed(err)) => {
                log::warn!("Listener on {channel_id} stopped: {err}");
            }
            None => self.active = None,
        }
    }

    fn handle_push(&self, push: PushNotification) {
        log::debug!("Push received on {}", push.topic);
        self.notifier
            .on_push_received(push.title.as_deref(), push.body.as_deref());
    }

    async fn close_channel(&mut self) {
        if let Some(subscription) = self.active.take() {
            log::info!("Leaving channel {}", subscription.channel_id());
            subscription.cancel().await;
        }
    }
}

async fn next_update(active: &mut Option<ChannelSubscription>) -> Option<SubscriptionUpdate> {
    match active {
        Some(subscription) => subscription.next().await,
        None => future::pending().await,
    }
}

async fn next_push(incoming: &mut Option<PushFeed>) -> Option<PushNotification> {
    match incoming {
        Some(feed) => feed.next().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::local;
    use crate::common::Message;
    use crate::gateway::PushTransport;

    struct Harness {
        commands: mpsc::Sender<ChatCommand>,
        events: mpsc::Receiver<ChatEvent>,
        backend: Backend,
        _media: tempfile::TempDir,
    }

    fn start() -> Harness {
        let media = tempfile::tempdir().unwrap();
        let backend = local::in_memory(media.path());
        let (commands, command_receiver) = mpsc::channel(16);
        let (event_sender, events) = mpsc::channel(16);
        tokio::spawn(ChatClient::new(backend.clone(), event_sender, command_receiver).run());
        Harness {
            commands,
            events,
            backend,
            _media: media,
        }
    }

    impl Harness {
        async fn send(&self, command: ChatCommand) {
            self.commands.send(command).await.unwrap();
        }

        async fn next_event(&mut self) -> ChatEvent {
            tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("event within timeout")
                .expect("client loop alive")
        }

        async fn next_messages(&mut self) -> Vec<Message> {
            loop {
                if let ChatEvent::MessagesUpdated { messages, .. } = self.next_event().await {
                    return messages;
                }
            }
        }

        async fn sign_up(&mut self, name: &str) {
            self.send(ChatCommand::SignUp {
                username: name.into(),
                email: format!("{name}@example.com"),
                password: "pw".into(),
            })
            .await;
            assert!(matches!(self.next_event().await, ChatEvent::SignedIn(_)));
        }
    }

    #[tokio::test]
    async fn bad_credentials_surface_as_generic_failure() {
        let mut harness = start();
        harness
            .send(ChatCommand::SignIn {
                email: "nobody@example.com".into(),
                password: "x".into(),
            })
            .await;
        assert!(matches!(harness.next_event().await, ChatEvent::AuthFailed));
    }

    #[tokio::test]
    async fn created_channel_appears_in_refreshed_list() {
        let mut harness = start();
        harness.sign_up("Alice").await;

        harness
            .send(ChatCommand::CreateChannel {
                name: "general".into(),
            })
            .await;
        match harness.next_event().await {
            ChatEvent::ChannelsLoaded(channels) => {
                assert!(channels.iter().any(|c| c.name == "general"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_send_and_close_channel() {
        let mut harness = start();
        harness.sign_up("Alice").await;

        harness
            .send(ChatCommand::OpenChannel {
                channel_id: "general".into(),
            })
            .await;
        assert!(harness.next_messages().await.is_empty());

        harness
            .send(ChatCommand::SendMessage {
                channel_id: "general".into(),
                text: "hello".into(),
            })
            .await;
        let messages = harness.next_messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message.as_deref(), Some("hello"));

        harness.send(ChatCommand::CloseChannel).await;
        harness
            .send(ChatCommand::LoadChannels)
            .await;
        // Closing detached the listener: the next event is the channel list,
        // not a late message snapshot.
        let message = Message {
            id: "late".into(),
            sender_id: "u2".into(),
            sender_name: "Bob".into(),
            message: Some("late".into()),
            image_url: None,
            create_at: 1,
        };
        harness.backend.messages.append("general", &message).await.unwrap();
        assert!(matches!(harness.next_event().await, ChatEvent::ChannelsLoaded(_)));
    }

    #[tokio::test]
    async fn pushes_from_others_are_shown_and_own_suppressed() {
        let mut harness = start();
        harness.sign_up("Alice").await;
        harness
            .send(ChatCommand::OpenChannel {
                channel_id: "general".into(),
            })
            .await;
        harness.next_messages().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        for body in ["Alice: mine", "Bob: hi"] {
            harness
                .backend
                .push
                .send_to_topic(&PushNotification {
                    topic: "group_general".into(),
                    title: Some("New message in general".into()),
                    body: Some(body.into()),
                })
                .await
                .unwrap();
        }

        loop {
            match harness.next_event().await {
                ChatEvent::NotificationShown(notification) => {
                    assert_eq!(notification.body, "Bob: hi");
                    break;
                }
                ChatEvent::MessagesUpdated { .. } => continue,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}
