//! Per-visitor session state
//!
//! A session owns its guessing-game controller and chat history. Sessions are
//! created explicitly (`POST /api/sessions`), removed explicitly
//! (`DELETE /api/sessions/:id`) or evicted after an idle period.

use chrono::{DateTime, Utc};
use exo_common::game::{CurveSettings, RoundController};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::ChatMessage;

/// Chat messages kept per session; the oldest are dropped first
pub const MAX_CHAT_MESSAGES: usize = 40;

/// Session-scoped context
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub game: RoundController,
    pub chat_history: Vec<ChatMessage>,
    /// Set while an assistant reply is streaming
    pub chat_in_flight: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    /// Append to the chat history, keeping at most [`MAX_CHAT_MESSAGES`]
    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat_history.push(message);
        let excess = self.chat_history.len().saturating_sub(MAX_CHAT_MESSAGES);
        if excess > 0 {
            self.chat_history.drain(..excess);
        }
    }
}

/// Game parameters applied to new sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub rounds_total: u32,
    pub curve: CurveSettings,
}

/// Shared map of live sessions
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    settings: SessionSettings,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Start a session and run `f` on it before it becomes visible to others
    pub async fn create<T>(&self, f: impl FnOnce(&mut Session) -> T) -> (Uuid, T) {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut session = Session {
            id,
            game: RoundController::new(self.settings.rounds_total, self.settings.curve),
            chat_history: Vec::new(),
            chat_in_flight: false,
            created_at: now,
            last_seen: now,
        };
        let out = f(&mut session);

        self.sessions.write().await.insert(id, session);
        info!(session_id = %id, "Session created");
        (id, out)
    }

    /// Run `f` against a live session, refreshing its idle timer
    ///
    /// Returns `None` when the session does not exist.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        session.last_seen = Utc::now();
        Some(f(session))
    }

    /// Tear down a session
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions not seen within `max_idle`; returns how many were dropped
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle)
            .unwrap_or_else(|_| chrono::Duration::weeks(520));
        let cutoff = Utc::now() - max_idle;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_seen >= cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions
    pub fn spawn_sweeper(&self, max_idle: Duration, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                debug!("Sweeping idle sessions");
                store.evict_idle(max_idle).await;
            }
        })
    }
}
