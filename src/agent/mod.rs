//! Conversational agent.
//!
//! A two-node loop: `chatbot` asks the model for the next message; if that
//! message requests tools, `tools` runs them and control returns to
//! `chatbot`, otherwise the turn ends. Thread state is loaded from and
//! saved to a [`Checkpointer`] around every turn.

pub mod checkpoint;

pub use checkpoint::{Checkpointer, MemoryCheckpointer, SqliteCheckpointer};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, ToolCall};
use crate::tools::ToolRegistry;

/// Reply used when the model ends a turn with no text.
pub const NO_REPLY: &str = "❌ No reply from model.";

/// Prompt placed at the start of every new thread.
pub const SYSTEM_PROMPT: &str = "\
You are a clinic assistant with full database access.
You have access to tools for booking, rescheduling, canceling appointments, checking availability, answering general queries, and listing doctors.
You can search any collection by name (e.g., 'doctor_availability', 'appointments').
If the user does not specify a collection, choose the most relevant one.
Always try a database search before saying something is unavailable.
Be detailed, accurate, and concise.";

/// Loop settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Node executions allowed per turn
    pub max_steps: u32,
    /// Prepended to new threads; empty for none
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Chatbot,
    Tools,
    End,
}

/// Model, tools and checkpoints wired into one entry point.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    checkpointer: Arc<dyn Checkpointer>,
    config: AgentConfig,
    /// One turn at a time per thread.
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        checkpointer: Arc<dyn Checkpointer>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            tools,
            checkpointer,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn turn_lock(&self, thread_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, AgentError> {
        let mut locks = self
            .turn_locks
            .lock()
            .map_err(|_| AgentError::Checkpoint("lock poisoned".to_string()))?;
        Ok(locks.entry(thread_id.to_string()).or_default().clone())
    }

    fn release_turn_lock(&self, thread_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.turn_locks.lock() {
            // The map and `lock` are the only holders when nobody is waiting.
            if Arc::strong_count(&lock) == 2 {
                locks.remove(thread_id);
            }
        }
    }

    /// Run one user turn on a thread and return the reply text.
    ///
    /// Turns on the same thread run one after another.
    pub async fn invoke(&self, thread_id: &str, input: &str) -> Result<String, AgentError> {
        let lock = self.turn_lock(thread_id)?;
        let result = {
            let _turn = lock.lock().await;
            self.turn(thread_id, input).await
        };
        self.release_turn_lock(thread_id, lock);
        result
    }

    async fn turn(&self, thread_id: &str, input: &str) -> Result<String, AgentError> {
        let mut messages = self.checkpointer.load(thread_id)?.unwrap_or_default();
        if messages.is_empty() && !self.config.system_prompt.is_empty() {
            messages.push(ChatMessage::system(self.config.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(input));

        tracing::debug!("Thread {}: turn starts with {} messages", thread_id, messages.len());
        let outcome = self.run(&mut messages).await;
        self.checkpointer.save(thread_id, &messages)?;
        outcome?;

        let reply = messages.last().map(ChatMessage::text).unwrap_or_default();
        if reply.trim().is_empty() {
            return Ok(NO_REPLY.to_string());
        }
        Ok(reply.to_string())
    }

    /// Stored messages of a thread.
    pub fn history(&self, thread_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        Ok(self.checkpointer.load(thread_id)?.unwrap_or_default())
    }

    async fn run(&self, messages: &mut Vec<ChatMessage>) -> Result<(), AgentError> {
        let specs = self.tools.specs();
        let mut node = Node::Chatbot;
        let mut steps = 0u32;

        while node != Node::End {
            steps += 1;
            if steps > self.config.max_steps {
                tracing::warn!("Step limit of {} reached", self.config.max_steps);
                return Err(AgentError::StepLimit(self.config.max_steps));
            }

            node = match node {
                Node::Chatbot => {
                    let reply = self.model.complete(messages, &specs).await?;
                    let next = if reply.tool_calls().is_empty() {
                        Node::End
                    } else {
                        Node::Tools
                    };
                    messages.push(reply);
                    next
                }
                Node::Tools => {
                    let calls = messages
                        .last()
                        .map(|m| m.tool_calls().to_vec())
                        .unwrap_or_default();
                    let results = join_all(calls.iter().map(|call| self.execute(call))).await;

                    let mut direct = false;
                    for (message, returns_direct) in results {
                        direct |= returns_direct;
                        messages.push(message);
                    }
                    if direct {
                        Node::End
                    } else {
                        Node::Chatbot
                    }
                }
                Node::End => Node::End,
            };
        }

        Ok(())
    }

    /// Run one tool call. Failures become the tool message text.
    async fn execute(&self, call: &ToolCall) -> (ChatMessage, bool) {
        let name = call.function.name.as_str();
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("Model requested unknown tool '{}'", name);
            let text = format!(
                "Error: {} is not a valid tool, try one of [{}].",
                name,
                self.tools.names().join(", ")
            );
            return (ChatMessage::tool(call, text), false);
        };

        tracing::info!("Calling tool {} with {}", name, call.function.arguments);
        let output = match call.arguments() {
            Ok(args) => tool.call(args).await.map_err(|e| e.to_string()),
            Err(e) => Err(format!("Invalid arguments for {}: {}", name, e)),
        };

        let text = match output {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                format!("Error: {}", e)
            }
        };
        (ChatMessage::tool(call, text), tool.returns_direct())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, ToolError};
    use crate::llm::testing::ScriptedModel;
    use crate::tools::{parse_args, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Shout {
        direct: bool,
    }

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &str {
            if self.direct {
                "shout_direct"
            } else {
                "shout"
            }
        }

        fn description(&self) -> &str {
            "Upper-case the text"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }

        fn returns_direct(&self) -> bool {
            self.direct
        }

        async fn call(&self, args: Value) -> Result<String, ToolError> {
            #[derive(serde::Deserialize)]
            struct Args {
                text: String,
            }
            let args: Args = parse_args(self.name(), args)?;
            Ok(args.text.to_uppercase())
        }
    }

    fn agent_with(model: Arc<ScriptedModel>, max_steps: u32) -> (Agent, Arc<MemoryCheckpointer>) {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Shout { direct: false })).unwrap();
        tools.register(Arc::new(Shout { direct: true })).unwrap();
        let checkpointer = Arc::new(MemoryCheckpointer::new());
        let agent = Agent::new(
            model,
            tools,
            checkpointer.clone(),
            AgentConfig {
                max_steps,
                system_prompt: "be nice".to_string(),
            },
        );
        (agent, checkpointer)
    }

    fn call(id: &str, name: &str, args: Value) -> ChatMessage {
        ChatMessage::assistant_calls(vec![ToolCall::new(id, name, &args)])
    }

    #[tokio::test]
    async fn test_plain_reply_and_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant("Hello!"),
            ChatMessage::assistant("Still here."),
        ]));
        let (agent, _) = agent_with(model.clone(), 25);

        assert_eq!(agent.invoke("10", "hi").await.unwrap(), "Hello!");
        assert_eq!(agent.invoke("10", "you there?").await.unwrap(), "Still here.");

        let history = agent.history("10").unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0], ChatMessage::system("be nice"));
        assert_eq!(history.iter().filter(|m| m.role() == "system").count(), 1);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1].0.len(), 4);
        assert_eq!(requests[0].1, vec!["shout", "shout_direct"]);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = Arc::new(ScriptedModel::new(vec![
            call("c1", "shout", json!({"text": "hey"})),
            ChatMessage::assistant("The tool said HEY."),
        ]));
        let (agent, _) = agent_with(model.clone(), 25);

        let reply = agent.invoke("t", "shout hey").await.unwrap();
        assert_eq!(reply, "The tool said HEY.");

        let requests = model.requests.lock().unwrap();
        let second = &requests[1].0;
        match second.last().unwrap() {
            ChatMessage::Tool { tool_call_id, name, content } => {
                assert_eq!(tool_call_id, "c1");
                assert_eq!(name, "shout");
                assert_eq!(content, "HEY");
            }
            other => panic!("expected a tool message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parallel_calls_keep_request_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_calls(vec![
                ToolCall::new("a", "shout", &json!({"text": "one"})),
                ToolCall::new("b", "shout", &json!({"text": "two"})),
            ]),
            ChatMessage::assistant("done"),
        ]));
        let (agent, _) = agent_with(model, 25);
        agent.invoke("t", "go").await.unwrap();

        let history = agent.history("t").unwrap();
        let tool_texts: Vec<&str> = history
            .iter()
            .filter(|m| m.role() == "tool")
            .map(ChatMessage::text)
            .collect();
        assert_eq!(tool_texts, vec!["ONE", "TWO"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_calls(vec![
                ToolCall::new("a", "teleport", &json!({})),
                ToolCall::new("b", "shout", &json!({"txt": "x"})),
            ]),
            ChatMessage::assistant("sorry"),
        ]));
        let (agent, _) = agent_with(model, 25);
        assert_eq!(agent.invoke("t", "go").await.unwrap(), "sorry");

        let history = agent.history("t").unwrap();
        let tool_texts: Vec<&str> = history
            .iter()
            .filter(|m| m.role() == "tool")
            .map(ChatMessage::text)
            .collect();
        assert_eq!(
            tool_texts[0],
            "Error: teleport is not a valid tool, try one of [shout, shout_direct]."
        );
        assert!(tool_texts[1].starts_with("Error: Invalid arguments for shout:"));
    }

    #[tokio::test]
    async fn test_return_direct_ends_turn() {
        let model = Arc::new(ScriptedModel::new(vec![call(
            "c1",
            "shout_direct",
            json!({"text": "raw rows"}),
        )]));
        let (agent, _) = agent_with(model.clone(), 25);

        assert_eq!(agent.invoke("t", "query").await.unwrap(), "RAW ROWS");
        assert_eq!(model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let model = Arc::new(ScriptedModel::new(
            (0..10)
                .map(|i| call(&format!("c{}", i), "shout", json!({"text": "again"})))
                .collect(),
        ));
        let (agent, checkpointer) = agent_with(model, 3);

        let err = agent.invoke("t", "loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::StepLimit(3)));
        assert!(checkpointer.load("t").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_reply() {
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::Assistant {
            content: None,
            tool_calls: Vec::new(),
        }]));
        let (agent, _) = agent_with(model, 25);
        assert_eq!(agent.invoke("t", "hi").await.unwrap(), NO_REPLY);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::failing(LlmError::EmptyResponse));
        let (agent, _) = agent_with(model, 25);
        assert!(matches!(
            agent.invoke("t", "hi").await,
            Err(AgentError::Model(LlmError::EmptyResponse))
        ));
    }

    #[tokio::test]
    async fn test_turns_on_one_thread_are_serialized() {
        let model = ScriptedModel::new(vec![
            ChatMessage::assistant("a"),
            ChatMessage::assistant("b"),
        ])
        .with_delay(std::time::Duration::from_millis(30));
        let agent = Agent::new(
            Arc::new(model),
            ToolRegistry::new(),
            Arc::new(MemoryCheckpointer::new()),
            AgentConfig::default(),
        );

        let (a, b) = tokio::join!(agent.invoke("10", "x"), agent.invoke("10", "y"));
        a.unwrap();
        b.unwrap();

        // system + two full turns
        assert_eq!(agent.history("10").unwrap().len(), 5);
        assert!(agent.turn_locks.lock().unwrap().is_empty());
    }
}
