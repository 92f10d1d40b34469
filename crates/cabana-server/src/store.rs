//! Async facade over the synchronous store.
//!
//! rusqlite calls run on the blocking thread pool so registry work and
//! broadcasts never wait on disk I/O. The mutex is only ever held inside the
//! blocking closure, never across an await.

use std::sync::{Arc, Mutex};

use cabana_shared::types::{Channel, ChannelId, MessageId, UserId};
use cabana_store::{Database, MessageRecord, StoreError};

/// Cloneable handle to the server database.
#[derive(Clone)]
pub struct SharedStore {
    db: Arc<Mutex<Database>>,
}

impl SharedStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db.lock().expect("store mutex poisoned");
            f(&db)
        })
        .await
        .expect("blocking store task panicked")
    }

    /// Load the authoritative row for a message id (relay protocol step 2).
    pub async fn load_message_with_author(
        &self,
        id: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        self.run(move |db| db.load_message_with_author(id)).await
    }

    pub async fn insert_message(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        content: String,
    ) -> Result<MessageRecord, StoreError> {
        self.run(move |db| db.insert_message(channel_id, user_id, &content))
            .await
    }

    pub async fn messages_for_channel(
        &self,
        channel_id: ChannelId,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.run(move |db| db.messages_for_channel(channel_id, limit))
            .await
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.run(|db| db.list_channels()).await
    }

    pub async fn get_channel(&self, id: ChannelId) -> Result<Channel, StoreError> {
        self.run(move |db| db.get_channel(id)).await
    }

    pub async fn create_channel(
        &self,
        name: String,
        created_by: Option<UserId>,
    ) -> Result<Channel, StoreError> {
        self.run(move |db| db.create_channel(&name, created_by))
            .await
    }

    pub async fn delete_channel(&self, id: ChannelId) -> Result<bool, StoreError> {
        self.run(move |db| db.delete_channel(id)).await
    }

    pub async fn ensure_default_channel(&self) -> Result<Channel, StoreError> {
        self.run(|db| db.ensure_default_channel()).await
    }
}
