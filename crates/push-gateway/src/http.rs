//! HTTP relay gateway client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::PushError;
use crate::message::PushMessage;
use crate::trait_def::PushGateway;

#[derive(Debug, Deserialize)]
struct RelayResponse {
    id: String,
}

/// Gateway client that POSTs messages to a push relay endpoint.
///
/// The relay terminates the provider-specific delivery (FCM/APNs); this
/// client only speaks the relay's JSON contract.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpGateway {
    /// Create a client for the given relay endpoint.
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            auth_token,
        }
    }
}

#[async_trait]
impl PushGateway for HttpGateway {
    async fn send(&self, message: PushMessage) -> Result<String, PushError> {
        debug!(token = %message.token, title = %message.title, "Posting push to relay");

        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RelayResponse = response.json().await?;
        Ok(body.id)
    }

    fn name(&self) -> &str {
        "http-relay"
    }
}
