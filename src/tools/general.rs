//! Pass-through to the model for questions unrelated to scheduling.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool};
use crate::error::ToolError;
use crate::llm::{ChatMessage, ChatModel};

/// Answers a query with a fresh, tool-less model call.
pub struct GeneralQuery {
    model: Arc<dyn ChatModel>,
}

impl GeneralQuery {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[derive(Deserialize)]
struct Args {
    query: String,
}

#[async_trait]
impl Tool for GeneralQuery {
    fn name(&self) -> &str {
        "general_query"
    }

    fn description(&self) -> &str {
        "Responds to any kind of general query like 'What is AI?', 'Tell me a joke', \
         'Summarize a paragraph', or questions about working hours and contact details."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Args = parse_args(self.name(), args)?;

        match self.model.complete(&[ChatMessage::user(args.query)], &[]).await {
            Ok(reply) => Ok(reply.text().to_string()),
            Err(e) => {
                tracing::warn!("General query failed: {}", e);
                Ok(format!("Error while processing your query: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::ScriptedModel;

    #[tokio::test]
    async fn test_forwards_query_alone() {
        let model = Arc::new(ScriptedModel::new(vec![ChatMessage::assistant("42")]));
        let tool = GeneralQuery::new(model.clone());

        let reply = tool.call(json!({"query": "meaning of life?"})).await.unwrap();
        assert_eq!(reply, "42");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].0, vec![ChatMessage::user("meaning of life?")]);
        assert!(requests[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_reported_as_text() {
        let model = Arc::new(ScriptedModel::failing(LlmError::Status {
            status: 429,
            body: "quota".to_string(),
        }));
        let reply = GeneralQuery::new(model)
            .call(json!({"query": "hi"}))
            .await
            .unwrap();
        assert_eq!(reply, "Error while processing your query: HTTP 429: quota");
    }
}
