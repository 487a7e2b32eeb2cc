//! Outbound message queue.

use std::future::Future;

use aws_sdk_sqs::error::DisplayErrorContext;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to send queue message: {0}")]
    Send(String),
}

/// A queue that accepts one JSON string body per message.
pub trait MessageQueue: Send + Sync {
    /// Send `body`, returning the queue-assigned message id.
    fn send(&self, body: String) -> impl Future<Output = Result<String, QueueError>> + Send;
}

/// Amazon SQS queue.
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env(queue_url: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_sqs::Client::new(&config), queue_url)
    }
}

impl MessageQueue for SqsQueue {
    async fn send(&self, body: String) -> Result<String, QueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Send(DisplayErrorContext(&e).to_string()))?;
        Ok(output.message_id().unwrap_or_default().to_string())
    }
}
