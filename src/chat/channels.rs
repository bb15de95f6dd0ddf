use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::common::{Channel, GatewayError};
use crate::gateway::ChannelDirectory;

#[derive(Clone)]
pub struct ChannelService {
    directory: Arc<dyn ChannelDirectory>,
}

impl ChannelService {
    pub fn new(directory: Arc<dyn ChannelDirectory>) -> Self {
        Self { directory }
    }

    /// Snapshot in backend iteration order.
    pub async fn list(&self) -> Result<Vec<Channel>, GatewayError> {
        self.directory.list().await
    }

    /// Fire-and-forget create; names are not checked for uniqueness. The
    /// handle resolves to the created record, or `None` after logging.
    pub fn create(&self, name: &str) -> JoinHandle<Option<Channel>> {
        let directory = Arc::clone(&self.directory);
        let name = name.trim().to_string();

        tokio::spawn(async move {
            match directory.create(&name).await {
                Ok(channel) => {
                    log::info!("Created channel {} ({})", channel.name, channel.id);
                    Some(channel)
                }
                Err(err) => {
                    log::warn!("Failed to create channel {name}: {err}");
                    None
                }
            }
        })
    }
}
