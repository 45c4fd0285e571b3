// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the timeline store capabilities.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::types::{BackendKind, HealthStatus, TimelineMessage, UserConversationState};
use courier_core::{Backend, CourierError, MessageStore, TimelineStore};

use crate::database::{Database, DatabaseOptions};
use crate::queries;

/// SQLite-backed timeline store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`SqliteStore::initialize`]; other SQLite backends share it through
/// [`SqliteStore::database`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens the database and applies migrations.
    pub async fn initialize(&self) -> Result<(), CourierError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with(&path, DatabaseOptions::from(&self.config)).await?;
        self.db.set(db).map_err(|_| CourierError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, CourierError> {
        self.db.get().ok_or_else(|| CourierError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(&self) -> Result<(), CourierError> {
        self.database()?.clone().close().await
    }
}

#[async_trait]
impl Backend for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save_message(&self, msg: &TimelineMessage) -> Result<u64, CourierError> {
        queries::messages::save_message(self.database()?, msg).await
    }

    async fn find_by_msg_id(&self, msg_id: &str) -> Result<Option<TimelineMessage>, CourierError> {
        queries::messages::find_by_msg_id(self.database()?, msg_id).await
    }
}

#[async_trait]
impl TimelineStore for SqliteStore {
    async fn list_messages(
        &self,
        conversation_id: &str,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<TimelineMessage>, CourierError> {
        queries::messages::list_messages(self.database()?, conversation_id, after_seq, limit).await
    }

    async fn upsert_ack(
        &self,
        user_id: &str,
        conversation_id: &str,
        ack_seq: u64,
    ) -> Result<(), CourierError> {
        queries::conversation_state::upsert_ack(self.database()?, user_id, conversation_id, ack_seq)
            .await
    }

    async fn get_ack_state(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<UserConversationState>, CourierError> {
        queries::conversation_state::get_ack_state(self.database()?, user_id, conversation_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{MsgType, STATUS_NORMAL};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }

    #[tokio::test]
    async fn sqlite_store_identifies_itself() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.kind(), BackendKind::Store);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(store.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert!(store.health_check().await.is_err());
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn timeline_lifecycle_through_traits() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();

        let msg = TimelineMessage {
            msg_id: "m1".to_string(),
            conversation_id: "private_a_b".to_string(),
            seq: 0,
            sender_id: "a".to_string(),
            content: "hello".to_string(),
            msg_type: MsgType::Image,
            status: STATUS_NORMAL,
            send_time: 42,
        };
        let seq = store.save_message(&msg).await.unwrap();
        assert_eq!(seq, 1);

        let found = store.find_by_msg_id("m1").await.unwrap().unwrap();
        assert_eq!(found.seq, 1);
        assert_eq!(found.msg_type, MsgType::Image);
        assert_eq!(found.send_time, 42);

        let page = store.list_messages("private_a_b", 0, 10).await.unwrap();
        assert_eq!(page.len(), 1);

        store.upsert_ack("b", "private_a_b", 1).await.unwrap();
        let state = store.get_ack_state("b", "private_a_b").await.unwrap().unwrap();
        assert_eq!(state.last_ack_seq, 1);

        store.close().await.unwrap();
    }
}
