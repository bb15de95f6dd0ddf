use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Interval, MissedTickBehavior};

use super::LocalDb;
use crate::common::{GatewayError, Message};
use crate::gateway::{MessageFeed, MessageStore, validate_channel_id};

pub struct LocalMessageStore {
    db: LocalDb,
    poll_interval: Duration,
}

impl LocalMessageStore {
    pub(crate) fn new(db: LocalDb, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }
}

#[async_trait]
impl MessageStore for LocalMessageStore {
    async fn append(&self, channel_id: &str, message: &Message) -> Result<(), GatewayError> {
        validate_channel_id(channel_id)?;
        self.db.lock().insert_message(channel_id, message)?;
        self.db.notify_changed(channel_id);
        Ok(())
    }

    async fn watch(&self, channel_id: &str) -> Result<MessageFeed, GatewayError> {
        validate_channel_id(channel_id)?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = WatchState {
            db: self.db.clone(),
            channel_id: channel_id.to_string(),
            changes: self.db.subscribe_changes(),
            ticker,
            last: None,
            done: false,
        };

        Ok(stream::unfold(state, next_snapshot).boxed())
    }
}

struct WatchState {
    db: LocalDb,
    channel_id: String,
    changes: broadcast::Receiver<String>,
    ticker: Interval,
    last: Option<Vec<Message>>,
    done: bool,
}

enum Wake {
    Reload,
    Skip,
    Closed,
}

async fn next_snapshot(
    mut state: WatchState,
) -> Option<(Result<Vec<Message>, GatewayError>, WatchState)> {
    if state.done {
        return None;
    }

    loop {
        if state.last.is_some() {
            let wake = tokio::select! {
                change = state.changes.recv() => match change {
                    Ok(channel_id) if channel_id == state.channel_id => Wake::Reload,
                    Ok(_) => Wake::Skip,
                    Err(RecvError::Lagged(_)) => Wake::Reload,
                    Err(RecvError::Closed) => Wake::Closed,
                },
                _ = state.ticker.tick() => Wake::Reload,
            };
            match wake {
                Wake::Reload => {}
                Wake::Skip => continue,
                Wake::Closed => return None,
            }
        }

        let loaded = state.db.lock().channel_messages(&state.channel_id);
        match loaded {
            Ok(messages) => {
                if state.last.as_ref() == Some(&messages) {
                    continue;
                }
                state.last = Some(messages.clone());
                return Some((Ok(messages), state));
            }
            Err(err) => {
                log::warn!("Local listener on {} failed: {err}", state.channel_id);
                state.done = true;
                return Some((Err(err.into()), state));
            }
        }
    }
}
