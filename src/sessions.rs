use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{validate_session_name, ApiClient};
use crate::chat::MessageIds;
use crate::error::ApiError;
use crate::normalize::attachments_from_metadata;
use crate::types::{ChatSessionSummary, Message, MessageStatus, SessionHistory};

/// Rebuilds chat messages from a persisted session: one message per stored
/// message, in stored order, cards only where metadata carries them.
pub fn reconcile_history(history: &SessionHistory, ids: &mut MessageIds) -> Vec<Message> {
    history
        .messages
        .iter()
        .map(|stored| Message {
            id: ids.next_id(),
            role: stored.role,
            content: stored.content.clone(),
            timestamp: stored
                .timestamp
                .or(history.updated_at)
                .unwrap_or_else(Utc::now),
            status: MessageStatus::Complete,
            intent: stored.intent.clone(),
            attachments: stored
                .metadata
                .as_ref()
                .map(attachments_from_metadata)
                .unwrap_or_default(),
        })
        .collect()
}

/// Recent-sessions sidebar backed by `/chat-history`.
#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    limit: usize,
    sessions: Arc<Mutex<Vec<ChatSessionSummary>>>,
}

impl SessionStore {
    pub fn new(api: ApiClient, limit: usize) -> Self {
        Self {
            api,
            limit,
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Last fetched list.
    pub async fn sessions(&self) -> Vec<ChatSessionSummary> {
        self.sessions.lock().await.clone()
    }

    pub async fn refresh(&self) -> Result<Vec<ChatSessionSummary>, ApiError> {
        let mut fetched = self.api.list_sessions(self.limit).await?.sessions;
        fetched.truncate(self.limit);
        let mut sessions = self.sessions.lock().await;
        *sessions = fetched;
        Ok(sessions.clone())
    }

    pub async fn load(&self, session_id: &str) -> Result<SessionHistory, ApiError> {
        let history = self.api.get_session(session_id).await?;
        info!(session_id, messages = history.messages.len(), "fetched session history");
        Ok(history)
    }

    /// Renames on the backend, applies the name locally, then refreshes.
    pub async fn rename(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Vec<ChatSessionSummary>, ApiError> {
        let name = validate_session_name(name)?;
        self.api.rename_session(session_id, name).await?;
        {
            let mut sessions = self.sessions.lock().await;
            if let Some(session) = sessions.iter_mut().find(|s| s.session_id == session_id) {
                session.name = Some(name.to_string());
            }
        }
        Ok(self.refresh_or_cached().await)
    }

    /// Deletes on the backend, drops the row locally, then refreshes.
    pub async fn delete(&self, session_id: &str) -> Result<Vec<ChatSessionSummary>, ApiError> {
        self.api.delete_session(session_id).await?;
        self.sessions
            .lock()
            .await
            .retain(|s| s.session_id != session_id);
        Ok(self.refresh_or_cached().await)
    }

    /// The mutation already succeeded; a failed follow-up refresh keeps the
    /// locally patched list.
    async fn refresh_or_cached(&self) -> Vec<ChatSessionSummary> {
        match self.refresh().await {
            Ok(list) => list,
            Err(error) => {
                warn!(%error, "session list refresh failed");
                self.sessions().await
            }
        }
    }
}
