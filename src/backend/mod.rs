//! Concrete gateway implementations, bundled per backend.

pub mod firebase;
pub mod local;

use std::sync::Arc;

use crate::config::BackendConfig;
use crate::gateway::{ChannelDirectory, MediaStorage, MessageStore, PushTransport, SessionProvider};

/// One implementation of every gateway, sharing whatever the backend needs
/// to share (HTTP client and session, or the SQLite handle).
#[derive(Clone)]
pub struct Backend {
    pub session: Arc<dyn SessionProvider>,
    pub messages: Arc<dyn MessageStore>,
    pub media: Arc<dyn MediaStorage>,
    pub channels: Arc<dyn ChannelDirectory>,
    pub push: Arc<dyn PushTransport>,
}

pub fn open(config: &BackendConfig) -> Result<Backend, Box<dyn std::error::Error>> {
    match config {
        BackendConfig::Local(local) => local::open(local),
        BackendConfig::Firebase(firebase) => firebase::open(firebase),
    }
}
