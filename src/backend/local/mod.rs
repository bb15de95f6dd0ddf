//! Single-machine backend: SQLite for records, a directory for media and an
//! in-process bus for pushes. Several client processes may share one database
//! file; they see each other's writes on the next poll tick.

mod channels;
mod media;
mod messages;
mod push;
mod session;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;

use channels::LocalChannels;
use media::LocalMedia;
use messages::LocalMessageStore;
use push::LocalPushBus;
use session::LocalSession;

use super::Backend;
use crate::config::LocalConfig;
use crate::storage::{ChatDatabase, ensure_data_dir};

/// Shared handle to the database plus the in-process change feed.
#[derive(Clone)]
pub(crate) struct LocalDb {
    db: Arc<Mutex<ChatDatabase>>,
    /// Channel ids whose message list changed in this process.
    changes: broadcast::Sender<String>,
}

impl LocalDb {
    pub(crate) fn new(db: ChatDatabase) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            db: Arc::new(Mutex::new(db)),
            changes,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChatDatabase> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify_changed(&self, channel_id: &str) {
        // No receivers simply means nobody is watching.
        let _ = self.changes.send(channel_id.to_string());
    }

    pub(crate) fn subscribe_changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

pub fn open(config: &LocalConfig) -> Result<Backend, Box<dyn std::error::Error>> {
    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            ensure_data_dir(parent)?;
        }
    }
    ensure_data_dir(&config.media_dir)?;

    let db = ChatDatabase::with_path(&config.database_path)?;
    log::info!(
        "Local backend using {} (media in {})",
        config.database_path,
        config.media_dir
    );

    Ok(assemble(
        LocalDb::new(db),
        LocalMedia::new(&config.media_dir)?,
        Duration::from_millis(config.poll_interval_ms),
    ))
}

pub(crate) fn assemble(db: LocalDb, media: LocalMedia, poll_interval: Duration) -> Backend {
    Backend {
        session: Arc::new(LocalSession::new(db.clone())),
        messages: Arc::new(LocalMessageStore::new(db.clone(), poll_interval)),
        media: Arc::new(media),
        channels: Arc::new(LocalChannels::new(db)),
        push: Arc::new(LocalPushBus::new()),
    }
}

/// In-memory backend for tests.
#[cfg(test)]
pub(crate) fn in_memory(media_dir: &Path) -> Backend {
    let db = ChatDatabase::in_memory().expect("in-memory database");
    let media = LocalMedia::new(media_dir).expect("media dir");
    assemble(LocalDb::new(db), media, Duration::from_secs(3600))
}
