//! Typed REST client for the messaging API.

use serde::{Deserialize, Serialize};

use hirelink_shared::types::{JobId, MessageId, UserId};
use hirelink_store::{ConversationSummary, Message};

use crate::error::ClientError;

/// Body of `POST /api/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub receiver_id: UserId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub is_system: bool,
}

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    unread_count: i64,
}

#[derive(Debug, Deserialize)]
struct ModifiedCountResponse {
    modified_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// REST client bound to one server and one bearer token.
#[derive(Debug, Clone)]
pub struct MessageApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl MessageApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/messages{}", self.base_url, path)
    }

    /// Persist a message. Returns the authoritative record with server id
    /// and timestamp.
    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, ClientError> {
        let response = self
            .http
            .post(self.url(""))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Full history with one peer, ascending.
    pub async fn conversation_with(&self, peer: UserId) -> Result<Vec<Message>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/conversation/{peer}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// History scoped to one job, ascending. A vanished job yields an empty
    /// list.
    pub async fn job_messages(&self, job: JobId) -> Result<Vec<Message>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/job/{job}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Conversation summaries for the caller.
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        let response = self
            .http
            .get(self.url("/conversations"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Unread message count for the caller.
    pub async fn unread_count(&self) -> Result<i64, ClientError> {
        let response = self
            .http
            .get(self.url("/unread/count"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: UnreadCountResponse = check(response).await?.json().await?;
        Ok(body.unread_count)
    }

    /// Mark one message as read (receiver only).
    pub async fn mark_read(&self, id: MessageId) -> Result<Message, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/read/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Mark all messages from `from` as read. Returns the modified count.
    pub async fn mark_all_read(&self, from: UserId) -> Result<u64, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/read/user/{from}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: ModifiedCountResponse = check(response).await?.json().await?;
        Ok(body.modified_count)
    }

    /// Hard-delete a message (sender only).
    pub async fn delete_message(&self, id: MessageId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Map non-success responses onto [`ClientError::Api`], keeping the server's
/// `{"error": ...}` message when it parses.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
