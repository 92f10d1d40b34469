//! REST API client: the request/response path that persists data before the
//! live channel announces it.

use cabana_shared::types::{Channel, ChannelId, ChatMessage};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ClientError;

/// HTTP client for the server's `/api` routes, authenticated with a bearer
/// token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// `base_url` is the server's HTTP origin, e.g. `http://localhost:3002`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn channels(&self) -> Result<Vec<Channel>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/channels", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        parse(response).await
    }

    pub async fn create_channel(&self, name: &str) -> Result<Channel, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/channels", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        parse(response).await
    }

    pub async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{}/api/channels/{}", self.base_url, channel_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        parse::<OkResponse>(response).await?;
        Ok(())
    }

    /// Most recent messages of a channel, newest first.
    pub async fn messages(&self, channel_id: ChannelId) -> Result<Vec<ChatMessage>, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/api/channels/{}/messages",
                self.base_url, channel_id
            ))
            .bearer_auth(&self.token)
            .send()
            .await?;
        parse(response).await
    }

    /// Persist a message; the caller announces the returned id over the
    /// live connection.
    pub async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<ChatMessage, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "channelId": channel_id, "content": content }))
            .send()
            .await?;
        parse(response).await
    }
}

#[derive(Deserialize)]
struct OkResponse {
    #[allow(dead_code)]
    ok: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Decode a response, turning non-2xx statuses into [`ClientError::Api`]
/// with the server's user-facing reason.
async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
