use crate::characters;
use crate::client::{ChatMessage, CompletionApi, CompletionRequest};
use crate::error::ChatError;
use crate::session::{ChatGate, Session};
use crate::store::{self, MessageStore, Role, StoredMessage};
use serde::Serialize;
use std::sync::Arc;

/// How many earlier messages are replayed to the model.
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub character_id: String,
    pub reply: String,
}

/// One chat turn: gate, history, completion, persistence.
pub struct ChatService {
    completion: Arc<dyn CompletionApi>,
    store: Arc<dyn MessageStore>,
    gate: ChatGate,
}

impl ChatService {
    pub fn new(completion: Arc<dyn CompletionApi>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            completion,
            store,
            gate: ChatGate::new(),
        }
    }

    pub async fn send(
        &self,
        session: &Session,
        character_id: &str,
        text: &str,
    ) -> Result<ChatReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let character = characters::find(character_id)
            .ok_or_else(|| ChatError::UnknownCharacter(character_id.to_string()))?;

        self.gate.admit(session)?;

        let result = self.exchange(session, character, text).await;
        if result.is_err() {
            self.gate.release(session);
        }
        result
    }

    async fn exchange(
        &self,
        session: &Session,
        character: &characters::Character,
        text: &str,
    ) -> Result<ChatReply, ChatError> {
        let mut messages: Vec<ChatMessage> = match session.user_id() {
            Some(user_id) => store::history(&*self.store, user_id, character.id, HISTORY_LIMIT)
                .await?
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            None => Vec::new(),
        };
        messages.push(ChatMessage {
            role: Role::User,
            content: text.to_string(),
        });

        let request = CompletionRequest {
            system_prompt: character.system_prompt(),
            messages,
        };
        let reply = self.completion.complete(session.bearer(), &request).await?;
        tracing::debug!(
            character = character.id,
            turns = request.messages.len(),
            "Chat completion received"
        );

        if let Some(user_id) = session.user_id() {
            self.store
                .append(StoredMessage::new(user_id, character.id, Role::User, text))
                .await?;
            self.store
                .append(StoredMessage::new(user_id, character.id, Role::Assistant, &reply))
                .await?;
        }

        Ok(ChatReply {
            character_id: character.id.to_string(),
            reply,
        })
    }
}
