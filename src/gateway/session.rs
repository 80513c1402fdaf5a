//! Session management for the chat gateway.
//!
//! A session is a browser's handle on one conversation thread. Sessions
//! expire after a period of inactivity; an expired session is dropped the
//! next time it is looked up or when expired sessions are swept.

use std::collections::HashMap;

use crate::config::SessionConfig;
use crate::error::SessionError;

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Session manager responsible for creating and maintaining sessions.
#[derive(Debug)]
pub struct SessionManager {
    /// Active sessions by session ID
    sessions: HashMap<String, Session>,

    /// Session configuration
    config: SessionManagerConfig,
}

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Session timeout in seconds
    pub timeout_seconds: u64,

    /// Maximum live sessions
    pub max_sessions: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 3600,
            max_sessions: 1000,
        }
    }
}

impl From<&SessionConfig> for SessionManagerConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds,
            max_sessions: config.max_sessions,
        }
    }
}

/// A chat session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier
    pub id: String,

    /// Conversation thread this session talks on
    pub thread_id: String,

    /// Completed turns
    pub turns: usize,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,

    /// Last activity timestamp (Unix milliseconds)
    pub last_activity: u64,
}

impl Session {
    /// Create a new session with its own thread.
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();

        Self {
            thread_id: format!("web-{}", id),
            id,
            turns: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Check if the session has expired.
    pub fn is_expired(&self, timeout_seconds: u64) -> bool {
        let elapsed_seconds = now_millis().saturating_sub(self.last_activity) / 1000;
        elapsed_seconds > timeout_seconds
    }

    /// Update the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = now_millis();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new() -> Self {
        Self::with_config(SessionManagerConfig::default())
    }

    /// Create a session manager with custom configuration.
    pub fn with_config(config: SessionManagerConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Resume a live session or start a new one.
    ///
    /// Unknown and expired ids both yield a fresh session.
    pub fn get_or_create(&mut self, session_id: Option<&str>) -> Result<&Session, SessionError> {
        if let Some(id) = session_id {
            let status = self.get(id).map(|_| ());
            match status {
                Ok(()) => {
                    let session = self.sessions.get_mut(id).ok_or(SessionError::NotFound)?;
                    session.touch();
                    return Ok(session);
                }
                Err(SessionError::Expired) => {
                    tracing::debug!("Session {} expired", id);
                    self.remove(id);
                }
                Err(SessionError::NotFound) => {}
            }
        }

        if self.sessions.len() >= self.config.max_sessions {
            self.cleanup_expired();
        }
        if self.sessions.len() >= self.config.max_sessions {
            self.evict_oldest();
        }

        let session = Session::new();
        tracing::info!("Started session {}", session.id);
        Ok(self.sessions.entry(session.id.clone()).or_insert(session))
    }

    /// Get a live session by ID.
    pub fn get(&self, session_id: &str) -> Result<&Session, SessionError> {
        let session = self.sessions.get(session_id).ok_or(SessionError::NotFound)?;
        if session.is_expired(self.config.timeout_seconds) {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Record a completed turn.
    pub fn record_turn(&mut self, session_id: &str) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(SessionError::NotFound)?;
        session.turns += 1;
        session.touch();
        Ok(())
    }

    /// Remove a session.
    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .sessions
            .values()
            .min_by_key(|s| s.last_activity)
            .map(|s| s.id.clone());
        if let Some(id) = oldest {
            tracing::debug!("Evicting session {}", id);
            self.remove(&id);
        }
    }

    /// Clean up expired sessions.
    pub fn cleanup_expired(&mut self) -> usize {
        let timeout = self.config.timeout_seconds;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(timeout));
        before - self.sessions.len()
    }

    /// Get all active sessions.
    pub fn list(&self) -> Vec<&Session> {
        self.sessions.values().collect()
    }

    /// Get the number of active sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Session information for API responses.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: String,
    /// Completed turns
    pub turns: usize,
    /// Creation timestamp
    pub created_at: u64,
    /// Last activity timestamp
    pub last_activity: u64,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            turns: session.turns,
            created_at: session.created_at,
            last_activity: session.last_activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age(manager: &mut SessionManager, id: &str, seconds: u64) {
        let session = manager.sessions.get_mut(id).unwrap();
        session.last_activity -= seconds * 1000;
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert_eq!(session.thread_id, format!("web-{}", session.id));
        assert_eq!(session.turns, 0);
        assert!(!session.is_expired(60));
    }

    #[test]
    fn test_session_manager_get_or_create() {
        let mut manager = SessionManager::new();

        let id1 = manager.get_or_create(None).unwrap().id.clone();
        let id2 = manager.get_or_create(Some(&id1)).unwrap().id.clone();
        assert_eq!(id1, id2);

        let id3 = manager.get_or_create(Some("no-such-session")).unwrap().id.clone();
        assert_ne!(id1, id3);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let mut manager = SessionManager::with_config(SessionManagerConfig {
            timeout_seconds: 60,
            max_sessions: 10,
        });
        let id = manager.get_or_create(None).unwrap().id.clone();
        age(&mut manager, &id, 120);

        assert!(matches!(manager.get(&id), Err(SessionError::Expired)));
        let fresh = manager.get_or_create(Some(&id)).unwrap().id.clone();
        assert_ne!(fresh, id);
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let mut manager = SessionManager::with_config(SessionManagerConfig {
            timeout_seconds: 60,
            max_sessions: 10,
        });
        let old = manager.get_or_create(None).unwrap().id.clone();
        manager.get_or_create(None).unwrap();
        age(&mut manager, &old, 120);

        assert_eq!(manager.cleanup_expired(), 1);
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let mut manager = SessionManager::with_config(SessionManagerConfig {
            timeout_seconds: 3600,
            max_sessions: 2,
        });
        let first = manager.get_or_create(None).unwrap().id.clone();
        let second = manager.get_or_create(None).unwrap().id.clone();
        age(&mut manager, &first, 10);

        manager.get_or_create(None).unwrap();
        assert_eq!(manager.count(), 2);
        assert!(manager.get(&first).is_err());
        assert!(manager.get(&second).is_ok());
    }

    #[test]
    fn test_record_turn() {
        let mut manager = SessionManager::new();
        let id = manager.get_or_create(None).unwrap().id.clone();
        manager.record_turn(&id).unwrap();

        let info = SessionInfo::from(manager.get(&id).unwrap());
        assert_eq!(info.turns, 1);
        assert!(matches!(manager.record_turn("nope"), Err(SessionError::NotFound)));

        assert!(manager.remove(&id).is_some());
        assert_eq!(manager.count(), 0);
    }
}
