//! Gateway module.
//!
//! The gateway puts the agent behind HTTP for the browser chat page.
//! Each browser holds a session, and each session owns one agent thread.
//!
//! ```text
//!  browser ──HTTP──▶ server ──▶ Gateway ──▶ Agent ──▶ model / tools
//!                                  │
//!                           SessionManager
//! ```

pub mod server;
pub mod session;

pub use server::GatewayServer;
pub use session::{Session, SessionInfo, SessionManager, SessionManagerConfig};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::agent::Agent;
use crate::error::GatewayError;
use crate::llm::ChatMessage;

/// Reply to one chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
}

/// One visible line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Main Gateway structure.
pub struct Gateway {
    agent: Arc<Agent>,
    sessions: RwLock<SessionManager>,
}

impl Gateway {
    /// Create a new Gateway instance.
    pub fn new(agent: Arc<Agent>, config: SessionManagerConfig) -> Self {
        Self {
            agent,
            sessions: RwLock::new(SessionManager::with_config(config)),
        }
    }

    /// Process an incoming message.
    ///
    /// This is the main entry point for message processing.
    pub async fn process_message(
        &self,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<ChatReply, GatewayError> {
        let (session_id, thread_id) = {
            let mut sessions = self.sessions.write().await;
            let expired = sessions.cleanup_expired();
            if expired > 0 {
                tracing::debug!("Pruned {} expired sessions", expired);
            }
            let session = sessions.get_or_create(session_id)?;
            (session.id.clone(), session.thread_id.clone())
        };

        let reply = self.agent.invoke(&thread_id, message).await?;

        if let Err(e) = self.sessions.write().await.record_turn(&session_id) {
            tracing::warn!("Session {} vanished mid-turn: {}", session_id, e);
        }

        Ok(ChatReply { session_id, reply })
    }

    /// User and assistant text of a session's thread.
    pub async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, GatewayError> {
        let thread_id = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id)?.thread_id.clone()
        };

        let messages = self.agent.history(&thread_id)?;
        Ok(messages
            .iter()
            .filter(|m| matches!(m, ChatMessage::User { .. } | ChatMessage::Assistant { .. }))
            .filter(|m| !m.text().trim().is_empty())
            .map(|m| HistoryEntry {
                role: m.role().to_string(),
                content: m.text().to_string(),
            })
            .collect())
    }

    /// Summaries of live sessions, most recent first.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<SessionInfo> = sessions.list().into_iter().map(SessionInfo::from).collect();
        infos.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, MemoryCheckpointer};
    use crate::llm::testing::ScriptedModel;
    use crate::tools::ToolRegistry;

    fn gateway_with(replies: Vec<ChatMessage>) -> Gateway {
        gateway_over(ScriptedModel::new(replies))
    }

    fn gateway_over(model: ScriptedModel) -> Gateway {
        let agent = Agent::new(
            Arc::new(model),
            ToolRegistry::new(),
            Arc::new(MemoryCheckpointer::new()),
            AgentConfig::default(),
        );
        Gateway::new(Arc::new(agent), SessionManagerConfig::default())
    }

    #[tokio::test]
    async fn test_session_continues_thread() {
        let gateway = gateway_with(vec![
            ChatMessage::assistant("Hi, how can I help?"),
            ChatMessage::assistant("Booked."),
        ]);

        let first = gateway.process_message(None, "hello").await.unwrap();
        let second = gateway
            .process_message(Some(&first.session_id), "book me")
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(second.reply, "Booked.");

        let history = gateway.history(&first.session_id).await.unwrap();
        assert_eq!(
            history,
            vec![
                HistoryEntry { role: "user".into(), content: "hello".into() },
                HistoryEntry { role: "assistant".into(), content: "Hi, how can I help?".into() },
                HistoryEntry { role: "user".into(), content: "book me".into() },
                HistoryEntry { role: "assistant".into(), content: "Booked.".into() },
            ]
        );

        let sessions = gateway.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turns, 2);
    }

    #[tokio::test]
    async fn test_unknown_session_history() {
        let gateway = gateway_with(vec![]);
        assert!(matches!(
            gateway.history("missing").await,
            Err(GatewayError::SessionError(_))
        ));
    }

    #[tokio::test]
    async fn test_agent_failure_maps_to_gateway_error() {
        let gateway = gateway_with(vec![]);
        assert!(matches!(
            gateway.process_message(None, "hello").await,
            Err(GatewayError::AgentError(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_messages_on_one_session_keep_every_turn() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("one"),
            ChatMessage::assistant("two"),
            ChatMessage::assistant("three"),
        ])
        .with_delay(std::time::Duration::from_millis(50));
        let gateway = gateway_over(model);

        let first = gateway.process_message(None, "first").await.unwrap();
        let id = first.session_id.as_str();
        let (second, third) = tokio::join!(
            gateway.process_message(Some(id), "second"),
            gateway.process_message(Some(id), "third"),
        );
        second.unwrap();
        third.unwrap();

        let users: Vec<String> = gateway
            .history(id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.role == "user")
            .map(|e| e.content)
            .collect();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0], "first");
        assert!(users.contains(&"second".to_string()));
        assert!(users.contains(&"third".to_string()));
        assert_eq!(gateway.sessions().await[0].turns, 3);
    }
}
