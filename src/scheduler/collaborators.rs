//! External services the scheduler drives but does not implement.

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
}

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<Response>> + Send>>;

/// AI session engine used by agent jobs.
///
/// Each streamed chunk must carry the full response text so far, not a delta:
/// the scheduler keeps only the last non-empty chunk as the job output.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    async fn create_session(&self) -> anyhow::Result<Session>;

    async fn send(
        &self,
        ctx: &CancellationToken,
        session_id: &str,
        messages: Vec<Message>,
    ) -> anyhow::Result<ResponseStream>;
}

/// Chat transport used to deliver job output.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_via_provider(&self, provider: &str, target: &str, content: &str) -> anyhow::Result<()>;
}
