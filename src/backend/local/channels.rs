use async_trait::async_trait;
use uuid::Uuid;

use super::LocalDb;
use crate::common::types::now_millis;
use crate::common::{Channel, GatewayError};
use crate::gateway::ChannelDirectory;

pub struct LocalChannels {
    db: LocalDb,
}

impl LocalChannels {
    pub(crate) fn new(db: LocalDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChannelDirectory for LocalChannels {
    async fn list(&self) -> Result<Vec<Channel>, GatewayError> {
        Ok(self.db.lock().all_channels()?)
    }

    async fn create(&self, name: &str) -> Result<Channel, GatewayError> {
        let channel = Channel {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            create_at: now_millis(),
        };
        self.db.lock().insert_channel(&channel)?;
        log::debug!("Created local channel {} ({})", channel.id, channel.name);
        Ok(channel)
    }
}
