//! Per-user, per-character message log.

use crate::error::ChatError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub user_id: String,
    pub character_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(user_id: &str, character_id: &str, role: Role, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            character_id: character_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only message log. Backed by a hosted database in production.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: StoredMessage) -> Result<(), ChatError>;

    /// Up to `limit` messages, newest first.
    async fn recent(
        &self,
        user_id: &str,
        character_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ChatError>;
}

/// The most recent `limit` messages in display order (oldest first).
pub async fn history(
    store: &dyn MessageStore,
    user_id: &str,
    character_id: &str,
    limit: usize,
) -> Result<Vec<StoredMessage>, ChatError> {
    let mut messages = store.recent(user_id, character_id, limit).await?;
    messages.reverse();
    Ok(messages)
}

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    logs: DashMap<(String, String), Vec<StoredMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: StoredMessage) -> Result<(), ChatError> {
        let key = (message.user_id.clone(), message.character_id.clone());
        self.logs.entry(key).or_default().push(message);
        Ok(())
    }

    async fn recent(
        &self,
        user_id: &str,
        character_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        let key = (user_id.to_string(), character_id.to_string());
        Ok(self
            .logs
            .get(&key)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
