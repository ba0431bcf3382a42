//! Conversation Context Store.
//!
//! Ephemeral per-session turn history plus an accumulated context map,
//! keyed by session id and owned by exactly one caller. Sessions idle
//! longer than the retention window are removed by the maintenance task;
//! nothing here survives a restart.

pub mod clarify;
pub mod extract;

pub use clarify::follow_up_questions;
pub use extract::extract_context;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Accumulated attributes such as `vendor` or `category`.
pub type ContextMap = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// The session exists but belongs to another caller.
    #[error("Conversation '{0}' belongs to another caller")]
    Forbidden(String),

    #[error("Conversation '{0}' not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Assistant turn that asked for clarification instead of answering.
    #[serde(default)]
    pub follow_up: bool,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            follow_up: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            follow_up: false,
        }
    }

    pub fn follow_up(content: impl Into<String>) -> Self {
        Self {
            follow_up: true,
            ..Self::assistant(content)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: String,
    pub caller_id: String,
    pub turns: Vec<Turn>,
    pub context: ContextMap,
    pub created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl ConversationSession {
    fn new(id: &str, caller_id: &str) -> Self {
        Self {
            id: id.to_string(),
            caller_id: caller_id.to_string(),
            turns: Vec::new(),
            context: ContextMap::new(),
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// Clarification rounds since the last real answer.
    pub fn consecutive_follow_ups(&self) -> usize {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::Assistant)
            .take_while(|t| t.follow_up)
            .count()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Concurrent session map.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: DashMap<String, ConversationSession>,
    max_turns: usize,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// Snapshot of the session, creating it for `caller_id` if absent.
    ///
    /// # Errors
    ///
    /// `Forbidden` if the session is owned by a different caller.
    pub fn get_or_create(
        &self,
        session_id: &str,
        caller_id: &str,
    ) -> Result<ConversationSession, ConversationError> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => {
                let session = entry.get();
                if session.caller_id != caller_id {
                    tracing::warn!(
                        conversation_id = %session_id,
                        caller_id = %caller_id,
                        "Rejected access to another caller's conversation"
                    );
                    return Err(ConversationError::Forbidden(session_id.to_string()));
                }
                Ok(session.clone())
            }
            Entry::Vacant(entry) => {
                tracing::debug!(conversation_id = %session_id, caller_id = %caller_id, "Created conversation");
                Ok(entry.insert(ConversationSession::new(session_id, caller_id)).clone())
            }
        }
    }

    pub fn append(&self, session_id: &str, turn: Turn) -> Result<(), ConversationError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ConversationError::NotFound(session_id.to_string()))?;
        session.turns.push(turn);
        let excess = session.turns.len().saturating_sub(self.max_turns);
        if excess > 0 {
            session.turns.drain(..excess);
        }
        session.last_activity = Instant::now();
        Ok(())
    }

    /// Merge newly extracted attributes; newer values win. Returns the merged map.
    pub fn merge_context(
        &self,
        session_id: &str,
        extracted: ContextMap,
    ) -> Result<ContextMap, ConversationError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ConversationError::NotFound(session_id.to_string()))?;
        session.context.extend(extracted);
        session.last_activity = Instant::now();
        Ok(session.context.clone())
    }

    pub fn delete(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Remove sessions idle for at least `retention`. Returns how many were removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.idle_for() < retention);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Swept idle conversations");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_and_ownership() {
        let store = ConversationStore::new(20);
        let session = store.get_or_create("c1", "alice").unwrap();
        assert_eq!(session.caller_id, "alice");
        assert!(session.turns.is_empty());

        assert_eq!(
            store.get_or_create("c1", "mallory").unwrap_err(),
            ConversationError::Forbidden("c1".to_string())
        );
        assert!(store.get_or_create("c1", "alice").is_ok());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_append_trims_oldest() {
        let store = ConversationStore::new(3);
        store.get_or_create("c1", "alice").unwrap();
        for i in 0..5 {
            store.append("c1", Turn::user(format!("m{}", i))).unwrap();
        }
        let session = store.get_or_create("c1", "alice").unwrap();
        let contents: Vec<_> = session.turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_append_unknown_session() {
        let store = ConversationStore::new(20);
        assert!(matches!(
            store.append("nope", Turn::user("x")),
            Err(ConversationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_context_newer_wins() {
        let store = ConversationStore::new(20);
        store.get_or_create("c1", "alice").unwrap();

        let first = ContextMap::from([
            ("device_type".to_string(), "laptop".to_string()),
            ("os".to_string(), "windows".to_string()),
        ]);
        store.merge_context("c1", first).unwrap();

        let second = ContextMap::from([("os".to_string(), "linux".to_string())]);
        let merged = store.merge_context("c1", second).unwrap();
        assert_eq!(merged.get("device_type").map(String::as_str), Some("laptop"));
        assert_eq!(merged.get("os").map(String::as_str), Some("linux"));
    }

    #[tokio::test]
    async fn test_consecutive_follow_ups() {
        let store = ConversationStore::new(20);
        store.get_or_create("c1", "alice").unwrap();
        store.append("c1", Turn::user("help")).unwrap();
        store.append("c1", Turn::assistant("answer")).unwrap();
        store.append("c1", Turn::user("still broken")).unwrap();
        store.append("c1", Turn::follow_up("which os?")).unwrap();
        store.append("c1", Turn::user("hmm")).unwrap();
        store.append("c1", Turn::follow_up("which vendor?")).unwrap();

        let session = store.get_or_create("c1", "alice").unwrap();
        assert_eq!(session.consecutive_follow_ups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_uses_last_activity() {
        let store = ConversationStore::new(20);
        store.get_or_create("stale", "alice").unwrap();
        store.get_or_create("active", "bob").unwrap();

        tokio::time::advance(Duration::from_secs(3000)).await;
        store.append("active", Turn::user("still here")).unwrap();
        tokio::time::advance(Duration::from_secs(700)).await;

        assert_eq!(store.sweep(Duration::from_secs(3600)), 1);
        assert!(store.get_or_create("active", "bob").is_ok());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = ConversationStore::new(20);
        store.get_or_create("c1", "alice").unwrap();
        assert!(store.delete("c1"));
        assert!(!store.delete("c1"));
        assert!(store.is_empty());
    }
}
