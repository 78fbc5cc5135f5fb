//! Recording mock gateway for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::PushError;
use crate::message::PushMessage;
use crate::trait_def::PushGateway;

/// A gateway that records every message instead of delivering it.
///
/// Deliveries to tokens registered with [`fail_token`](Self::fail_token)
/// return an injected error, for exercising failure-annotation paths.
#[derive(Debug, Default)]
pub struct MockGateway {
    sent: Mutex<Vec<PushMessage>>,
    failing_tokens: Mutex<HashSet<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `token` fail.
    pub async fn fail_token(&self, token: &str) {
        self.failing_tokens.lock().await.insert(token.to_string());
    }

    /// Messages recorded so far, in send order.
    pub async fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of messages recorded so far.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PushGateway for MockGateway {
    async fn send(&self, message: PushMessage) -> Result<String, PushError> {
        if self.failing_tokens.lock().await.contains(&message.token) {
            return Err(PushError::Failed(format!(
                "injected failure for token {}",
                message.token
            )));
        }

        let mut sent = self.sent.lock().await;
        sent.push(message);
        Ok(format!("mock-{}", sent.len()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_and_injects_failures() {
        let gateway = MockGateway::new();
        gateway.fail_token("bad").await;

        let id = gateway
            .send(PushMessage::new("good", "Hi", "There"))
            .await
            .unwrap();
        assert_eq!(id, "mock-1");

        let err = gateway
            .send(PushMessage::new("bad", "Hi", "There"))
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Failed(_)));

        assert_eq!(gateway.sent_count().await, 1);
    }
}
